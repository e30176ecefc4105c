//! End-to-end filter scenarios: compile a predicate stream, run it over
//! in-memory columns and check the selected rows.

use std::ops::Range;
use std::sync::Arc;

use predjit_common::{JitConfig, JitError};
use predjit_jit::alu::{INT_NULL, LONG_NULL};
use predjit_jit::{FilterCache, compile_filter};
use predjit_types::{DataType, Instruction, Opcode};

fn ptr<T>(v: &[T]) -> *const u8 {
    v.as_ptr() as *const u8
}

fn checked() -> JitConfig {
    JitConfig::default()
}

fn unchecked() -> JitConfig {
    JitConfig {
        null_check: false,
        ..JitConfig::default()
    }
}

fn run_filter(
    stream: &[Instruction],
    config: &JitConfig,
    columns: &[*const u8],
    aux: &[*const u8],
    vars: *const u8,
    rows: Range<i64>,
) -> Vec<i64> {
    let filter = compile_filter(stream, config).expect("compilation failed");
    let mut out = vec![0i64; (rows.end - rows.start) as usize];
    let n = unsafe { filter.execute(columns, aux, vars, rows, &mut out) };
    out.truncate(n);
    out
}

fn run_columns(stream: &[Instruction], config: &JitConfig, columns: &[*const u8], rows: i64) -> Vec<i64> {
    run_filter(stream, config, columns, &[], std::ptr::null(), 0..rows)
}

fn cmp(col: Instruction, imm: Instruction, op: Opcode) -> Vec<Instruction> {
    vec![col, imm, Instruction::op(op), Instruction::ret()]
}

// ---------------------------------------------------------------------------
// Null sentinel fixture and the basic scenario
// ---------------------------------------------------------------------------

#[test]
fn greater_than_skips_null_row() {
    assert_eq!(INT_NULL, i32::MIN);
    let col: Vec<i32> = vec![3, 5, 7, INT_NULL];
    let stream = cmp(
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 5),
        Opcode::Gt,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 4), vec![2]);
}

#[test]
fn ordering_null_check_is_configurable() {
    let col: Vec<i32> = vec![-1, INT_NULL, 4];
    let stream = cmp(
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 0),
        Opcode::Lt,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![0]);
    assert_eq!(run_columns(&stream, &unchecked(), &[ptr(&col)], 3), vec![0, 1]);
}

#[test]
fn equality_treats_two_nulls_as_equal() {
    let col: Vec<i64> = vec![LONG_NULL, 0, LONG_NULL];
    let stream = cmp(
        Instruction::mem(DataType::I64, 0),
        Instruction::imm_int(DataType::I64, LONG_NULL),
        Opcode::Eq,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![0, 2]);
}

// ---------------------------------------------------------------------------
// Fixed-width addressing
// ---------------------------------------------------------------------------

const ROWS: i64 = 5000;

fn expected(rows: Range<i64>, pred: impl Fn(i64) -> bool) -> Vec<i64> {
    rows.filter(|&r| pred(r)).collect()
}

#[test]
fn one_byte_column() {
    let col: Vec<i8> = (0..ROWS).map(|r| (r % 97) as i8 - 48).collect();
    let stream = cmp(
        Instruction::mem(DataType::I8, 1),
        Instruction::imm_int(DataType::I8, -35),
        Opcode::Eq,
    );
    let columns = [std::ptr::null(), ptr(&col)];
    let got = run_columns(&stream, &checked(), &columns, ROWS);
    assert_eq!(got, expected(0..ROWS, |r| r % 97 == 13));
}

#[test]
fn two_byte_column_against_variable() {
    let col: Vec<i16> = (0..ROWS).map(|r| (r * 7) as i16).collect();
    let vars: [i64; 2] = [0, 7 * 4321];
    let stream = cmp(
        Instruction::mem(DataType::I16, 0),
        Instruction::var(DataType::I16, 1),
        Opcode::Eq,
    );
    let got = run_filter(&stream, &checked(), &[ptr(&col)], &[], ptr(&vars), 0..ROWS);
    assert_eq!(got, vec![4321]);
}

#[test]
fn four_byte_column_at_large_row_offsets() {
    let col: Vec<f32> = (0..ROWS).map(|r| r as f32 * 0.5).collect();
    let stream = cmp(
        Instruction::mem(DataType::F32, 2),
        Instruction::imm_float(DataType::F32, 2497.0),
        Opcode::Ge,
    );
    let columns = [std::ptr::null(), std::ptr::null(), ptr(&col)];
    let got = run_filter(&stream, &checked(), &columns, &[], std::ptr::null(), 4990..ROWS);
    assert_eq!(got, expected(4994..ROWS, |_| true));
}

#[test]
fn eight_byte_column() {
    let col: Vec<i64> = (0..ROWS).map(|r| r * 3).collect();
    let stream = cmp(
        Instruction::mem(DataType::I64, 0),
        Instruction::imm_int(DataType::I64, 3 * (ROWS - 1)),
        Opcode::Eq,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], ROWS), vec![ROWS - 1]);
    assert_eq!(
        run_filter(&stream, &checked(), &[ptr(&col)], &[], std::ptr::null(), 0..1),
        Vec::<i64>::new()
    );
}

#[test]
fn sixteen_byte_column() {
    let value = |r: i64| (i128::from(r) << 70) | i128::from(r);
    let col: Vec<i128> = (0..ROWS).map(value).collect();
    for target in [0, 1, 4000, ROWS - 1] {
        let stream = cmp(
            Instruction::mem(DataType::I128, 0),
            Instruction::imm_i128(value(target)),
            Opcode::Eq,
        );
        assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], ROWS), vec![target]);
    }

    let stream = cmp(
        Instruction::mem(DataType::I128, 0),
        Instruction::imm_i128(value(0)),
        Opcode::Ne,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![1, 2]);
}

#[test]
fn ordering_on_i128_is_rejected() {
    let stream = cmp(
        Instruction::mem(DataType::I128, 0),
        Instruction::imm_i128(0),
        Opcode::Gt,
    );
    assert!(matches!(
        compile_filter(&stream, &checked()),
        Err(JitError::UnsupportedOperation { .. })
    ));
}

// ---------------------------------------------------------------------------
// Variable-length columns
// ---------------------------------------------------------------------------

/// Builds a string/binary column: each value is a `header_size` header
/// followed by its bytes. `None` is null.
fn varsize_column(values: &[Option<&[u8]>], header_size: usize) -> (Vec<u8>, Vec<i64>) {
    let mut data = Vec::new();
    let mut offsets = vec![0i64];
    for v in values {
        let header: i64 = match v {
            Some(bytes) => bytes.len() as i64,
            None => -1,
        };
        data.extend_from_slice(&header.to_le_bytes()[..header_size]);
        if let Some(bytes) = v {
            data.extend_from_slice(bytes);
        }
        offsets.push(data.len() as i64);
    }
    (data, offsets)
}

#[test]
fn string_length_reads_header_on_every_zero_difference() {
    let values: [Option<&[u8]>; 5] = [Some(b"a"), Some(b""), None, Some(b""), Some(b"xyz")];
    let (data, offsets) = varsize_column(&values, 4);
    assert_eq!(offsets, vec![0, 5, 9, 13, 17, 24]);
    let columns = [ptr(&data)];
    let aux = [ptr(&offsets)];

    let lengths_equal = |k: i64| {
        let stream = cmp(
            Instruction::mem(DataType::StringHeader, 0),
            Instruction::imm_int(DataType::StringHeader, k),
            Opcode::Eq,
        );
        run_filter(&stream, &checked(), &columns, &aux, std::ptr::null(), 0..5)
    };
    assert_eq!(lengths_equal(-1), vec![2]);
    assert_eq!(lengths_equal(0), vec![1, 3]);
    assert_eq!(lengths_equal(1), vec![0]);
    assert_eq!(lengths_equal(3), vec![4]);

    let not_null = cmp(
        Instruction::mem(DataType::StringHeader, 0),
        Instruction::imm_int(DataType::StringHeader, -1),
        Opcode::Ne,
    );
    assert_eq!(
        run_filter(&not_null, &checked(), &columns, &aux, std::ptr::null(), 0..5),
        vec![0, 1, 3, 4]
    );
}

#[test]
fn binary_length_uses_eight_byte_header() {
    let values: [Option<&[u8]>; 4] = [None, Some(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), Some(&[]), None];
    let (data, offsets) = varsize_column(&values, 8);
    let columns = [std::ptr::null(), ptr(&data)];
    let aux = [std::ptr::null(), ptr(&offsets)];

    let is_null = cmp(
        Instruction::mem(DataType::BinaryHeader, 1),
        Instruction::imm_int(DataType::BinaryHeader, -1),
        Opcode::Eq,
    );
    assert_eq!(
        run_filter(&is_null, &checked(), &columns, &aux, std::ptr::null(), 0..4),
        vec![0, 3]
    );

    let longer_than_eight = cmp(
        Instruction::mem(DataType::BinaryHeader, 1),
        Instruction::imm_int(DataType::I64, 8),
        Opcode::Gt,
    );
    assert_eq!(
        run_filter(&longer_than_eight, &checked(), &columns, &aux, std::ptr::null(), 0..4),
        vec![1]
    );
}

#[test]
fn varchar_header_detects_null() {
    const NULL_HEADER: i64 = 4;
    // Two 8-byte words per row; the header is the low word.
    let aux_entries: Vec<i64> = vec![
        (3 << 4) | 1, 0x1234,
        NULL_HEADER, 0,
        (11 << 4) | 1, 0x5678,
        NULL_HEADER, 0,
    ];
    let aux = [ptr(&aux_entries)];
    let stream = cmp(
        Instruction::mem(DataType::VarcharHeader, 0),
        Instruction::imm_int(DataType::VarcharHeader, NULL_HEADER),
        Opcode::Ne,
    );
    assert_eq!(
        run_filter(&stream, &checked(), &[std::ptr::null()], &aux, std::ptr::null(), 0..4),
        vec![0, 2]
    );
}

// ---------------------------------------------------------------------------
// Floats
// ---------------------------------------------------------------------------

#[test]
fn epsilon_ordering_is_consistent() {
    let a: Vec<f32> = vec![1.0, 1.0, 2.0];
    let b: Vec<f32> = vec![1.000_000_1, 1.5, 1.0];
    let columns = [ptr(&a), ptr(&b)];
    let pair = |op| {
        let stream = vec![
            Instruction::mem(DataType::F32, 0),
            Instruction::mem(DataType::F32, 1),
            Instruction::op(op),
        ];
        run_columns(&stream, &checked(), &columns, 3)
    };
    assert_eq!(pair(Opcode::Eq), vec![0]);
    assert_eq!(pair(Opcode::Ne), vec![1, 2]);
    assert_eq!(pair(Opcode::Ge), vec![0, 2]);
    assert_eq!(pair(Opcode::Le), vec![0, 1]);
    assert_eq!(pair(Opcode::Gt), vec![2]);
    assert_eq!(pair(Opcode::Lt), vec![1]);
}

#[test]
fn double_epsilon_is_tighter() {
    let col: Vec<f64> = vec![1.0 + 1e-11, 1.0 + 1e-9, 1.0];
    let stream = cmp(
        Instruction::mem(DataType::F64, 0),
        Instruction::imm_float(DataType::F64, 1.0),
        Opcode::Eq,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![0, 2]);
}

#[test]
fn nan_is_float_null() {
    let col: Vec<f64> = vec![f64::NAN, 2.0, f64::NAN];
    let is_null = cmp(
        Instruction::mem(DataType::F64, 0),
        Instruction::imm_float(DataType::F64, f64::NAN),
        Opcode::Eq,
    );
    assert_eq!(run_columns(&is_null, &checked(), &[ptr(&col)], 3), vec![0, 2]);

    let positive = cmp(
        Instruction::mem(DataType::F64, 0),
        Instruction::imm_float(DataType::F64, 0.0),
        Opcode::Gt,
    );
    assert_eq!(run_columns(&positive, &checked(), &[ptr(&col)], 3), vec![1]);
}

#[test]
fn nan_against_nan_never_orders_when_checked() {
    let a: Vec<f64> = vec![f64::NAN, f64::NAN, 1.0, 2.0];
    let b: Vec<f64> = vec![f64::NAN, 1.0, f64::NAN, 2.0];
    let columns = [ptr(&a), ptr(&b)];
    let pair = |op, config: &JitConfig| {
        let stream = vec![
            Instruction::mem(DataType::F64, 0),
            Instruction::mem(DataType::F64, 1),
            Instruction::op(op),
        ];
        run_columns(&stream, config, &columns, 4)
    };
    assert_eq!(pair(Opcode::Ge, &checked()), vec![3]);
    assert_eq!(pair(Opcode::Le, &checked()), vec![3]);
    assert_eq!(pair(Opcode::Gt, &checked()), Vec::<i64>::new());
    assert_eq!(pair(Opcode::Lt, &checked()), Vec::<i64>::new());
    assert_eq!(pair(Opcode::Eq, &checked()), vec![0, 3]);

    // Without the check, two NaNs are epsilon-equal and so `>=` and `<=`.
    assert_eq!(pair(Opcode::Ge, &unchecked()), vec![0, 3]);
    assert_eq!(pair(Opcode::Le, &unchecked()), vec![0, 3]);
}

#[test]
fn i64_against_f32_compares_in_double() {
    let ints: Vec<i64> = vec![16_777_217, 16_777_216, LONG_NULL];
    let vars: [f32; 2] = [16_777_216.0, 0.0];
    let stream = cmp(
        Instruction::mem(DataType::I64, 0),
        Instruction::var(DataType::F32, 0),
        Opcode::Gt,
    );
    assert_eq!(
        run_filter(&stream, &checked(), &[ptr(&ints)], &[], ptr(&vars), 0..3),
        vec![0]
    );
}

#[test]
fn negated_double_column() {
    let col: Vec<f64> = vec![1.5, -2.0, 0.0];
    let stream = vec![
        Instruction::mem(DataType::F64, 0),
        Instruction::op(Opcode::Neg),
        Instruction::imm_int(DataType::I32, 0),
        Instruction::op(Opcode::Lt),
    ];
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![0]);
}

// ---------------------------------------------------------------------------
// Immediates and integer arithmetic
// ---------------------------------------------------------------------------

#[test]
fn out_of_range_literal_widens_instead_of_truncating() {
    let col: Vec<i32> = vec![0, i32::MAX, INT_NULL];
    let stream = cmp(
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 2_147_483_648),
        Opcode::Lt,
    );
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![0, 1]);
}

#[test]
fn division_never_traps() {
    let a: Vec<i64> = vec![10, 7, 5, LONG_NULL];
    let b: Vec<i64> = vec![2, 0, -1, -1];
    let columns = [ptr(&a), ptr(&b)];
    let quotient_is = |k: i64, config: &JitConfig| {
        let stream = vec![
            Instruction::mem(DataType::I64, 0),
            Instruction::mem(DataType::I64, 1),
            Instruction::op(Opcode::Div),
            Instruction::imm_int(DataType::I64, k),
            Instruction::op(Opcode::Eq),
        ];
        run_columns(&stream, config, &columns, 4)
    };
    assert_eq!(quotient_is(LONG_NULL, &checked()), vec![1, 3]);
    assert_eq!(quotient_is(LONG_NULL, &unchecked()), vec![1, 3]);
    assert_eq!(quotient_is(5, &checked()), vec![0]);
    assert_eq!(quotient_is(-5, &checked()), vec![2]);
}

#[test]
fn arithmetic_propagates_null_when_checked() {
    let col: Vec<i32> = vec![1, INT_NULL, -1];
    let stream = vec![
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 1),
        Instruction::op(Opcode::Add),
        Instruction::imm_int(DataType::I32, i64::from(INT_NULL)),
        Instruction::op(Opcode::Eq),
    ];
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&col)], 3), vec![1]);
    assert!(run_columns(&stream, &unchecked(), &[ptr(&col)], 3).is_empty());
}

#[test]
fn narrow_values_are_not_nulls() {
    // i8::MIN sign-extends to -128, never to the 32-bit sentinel.
    let col: Vec<i8> = vec![i8::MIN, 0, 5];
    let vars: [i64; 1] = [-128];
    let stream = cmp(
        Instruction::mem(DataType::I8, 0),
        Instruction::var(DataType::I64, 0),
        Opcode::Eq,
    );
    assert_eq!(
        run_filter(&stream, &checked(), &[ptr(&col)], &[], ptr(&vars), 0..3),
        vec![0]
    );
}

#[test]
fn boolean_connectives() {
    let a: Vec<i32> = vec![1, 2, 3, 4];
    let b: Vec<i64> = vec![0, 5, 0, 5];
    let columns = [ptr(&a), ptr(&b)];
    // a > 1 AND NOT (b == 0)
    let and_not = vec![
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 1),
        Instruction::op(Opcode::Gt),
        Instruction::mem(DataType::I64, 1),
        Instruction::imm_int(DataType::I64, 0),
        Instruction::op(Opcode::Eq),
        Instruction::op(Opcode::Not),
        Instruction::op(Opcode::And),
        Instruction::ret(),
    ];
    assert_eq!(run_columns(&and_not, &checked(), &columns, 4), vec![1, 3]);

    // a == 1 OR a * 2 == 6
    let or = vec![
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 1),
        Instruction::op(Opcode::Eq),
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 2),
        Instruction::op(Opcode::Mul),
        Instruction::imm_int(DataType::I32, 6),
        Instruction::op(Opcode::Eq),
        Instruction::op(Opcode::Or),
    ];
    assert_eq!(run_columns(&or, &checked(), &columns, 4), vec![0, 2]);
}

#[test]
fn subtraction_operand_order() {
    // Postfix `a b -` is a - b.
    let a: Vec<i32> = vec![10, 3];
    let b: Vec<i32> = vec![4, 9];
    let stream = vec![
        Instruction::mem(DataType::I32, 0),
        Instruction::mem(DataType::I32, 1),
        Instruction::op(Opcode::Sub),
        Instruction::imm_int(DataType::I32, 6),
        Instruction::op(Opcode::Eq),
    ];
    assert_eq!(run_columns(&stream, &checked(), &[ptr(&a), ptr(&b)], 2), vec![0]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn invalid_instruction_aborts_compilation() {
    let stream = [
        Instruction::mem(DataType::I32, 0),
        Instruction::imm_int(DataType::I32, 1),
        Instruction::op(Opcode::Inv),
        Instruction::op(Opcode::Gt),
    ];
    assert_eq!(
        compile_filter(&stream, &checked()).unwrap_err(),
        JitError::InvalidInstruction { position: 2 }
    );
}

#[test]
fn stack_underflow_aborts_compilation() {
    let stream = [Instruction::mem(DataType::I32, 0), Instruction::op(Opcode::Eq)];
    assert_eq!(
        compile_filter(&stream, &checked()).unwrap_err(),
        JitError::StackUnderflow { position: 1 }
    );
}

#[test]
fn mismatched_tags_abort_compilation() {
    let stream = cmp(
        Instruction::mem(DataType::VarcharHeader, 0),
        Instruction::mem(DataType::I128, 1),
        Opcode::Eq,
    );
    assert!(matches!(
        compile_filter(&stream, &checked()),
        Err(JitError::TypeMismatch { .. })
    ));
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[test]
fn cached_filter_runs_on_many_threads() {
    let cache = FilterCache::new(8);
    let stream = cmp(
        Instruction::mem(DataType::I64, 0),
        Instruction::imm_int(DataType::I64, 50),
        Opcode::Ge,
    );
    let filter = cache.get_or_compile(&stream, &checked()).unwrap();
    let again = cache.get_or_compile(&stream, &checked()).unwrap();
    assert!(Arc::ptr_eq(&filter, &again));

    let col: Vec<i64> = (0..100).collect();
    std::thread::scope(|s| {
        for t in 0..4i64 {
            let filter = Arc::clone(&filter);
            let col = &col;
            s.spawn(move || {
                let columns = [ptr(col)];
                let rows = t * 25..(t + 1) * 25;
                let mut out = vec![0i64; 25];
                let n = unsafe { filter.execute(&columns, &[], std::ptr::null(), rows.clone(), &mut out) };
                let want: Vec<i64> = rows.filter(|&r| r >= 50).collect();
                assert_eq!(&out[..n], want.as_slice());
            });
        }
    });
}
