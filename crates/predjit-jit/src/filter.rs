//! Filter function assembly: wraps the emitted predicate in a row loop.

use std::ops::Range;

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, AbiParam, InstBuilder, MemFlags};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, Linkage, Module};

use predjit_common::{JitConfig, JitError, JitResult};
use predjit_types::{DataType, Instruction, Rank};

use crate::addressor::FrameRegisters;
use crate::asm::Asm;
use crate::const_pool::ConstPool;
use crate::evaluator::emit_code;
use crate::materialize::load_value;
use crate::value::OperandStack;

type FilterFn = unsafe extern "C" fn(
    *const *const u8,
    *const *const u8,
    *const u8,
    i64,
    i64,
    *mut i64,
) -> i64;

/// A compiled filter predicate.
///
/// Owns the code pages and the constant pool the code reads from.
pub struct CompiledFilter {
    /// Signature: `(column_table, aux_table, vars, row_start, row_end,
    /// out_rows) -> count`.
    ///
    /// - `column_table`: one data pointer per column
    /// - `aux_table`: one aux pointer per column (offsets or varchar headers)
    /// - `vars`: 8-byte variable slots
    /// - `row_start..row_end`: rows to evaluate
    /// - `out_rows`: receives the index of every row that passes
    /// - returns: number of rows written to `out_rows`
    fn_ptr: FilterFn,
    /// Keeps the JIT code pages alive.
    _module: JITModule,
    /// Keeps pooled literals alive; their addresses are baked into the code.
    _pool: ConstPool,
    result_type: DataType,
}

// SAFETY: After `JITModule::finalize_definitions()` the code pages and the
// constant pool are never written again. `fn_ptr` is a plain function pointer
// that only reads them.
unsafe impl Send for CompiledFilter {}
unsafe impl Sync for CompiledFilter {}

impl CompiledFilter {
    /// Type of the predicate value before the non-zero test.
    pub fn result_type(&self) -> DataType {
        self.result_type
    }

    /// Runs the filter over `rows` and returns how many rows passed.
    ///
    /// # Safety
    /// Every column and aux pointer the predicate reads must be valid for all
    /// rows in `rows` (aux offset arrays for one row past the end), `vars`
    /// must cover every variable slot read, and `out` must hold at least
    /// `rows.end - rows.start` entries.
    #[inline]
    pub unsafe fn execute(
        &self,
        columns: &[*const u8],
        aux: &[*const u8],
        vars: *const u8,
        rows: Range<i64>,
        out: &mut [i64],
    ) -> usize {
        debug_assert!(out.len() as i64 >= rows.end - rows.start);
        let count = unsafe {
            (self.fn_ptr)(
                columns.as_ptr(),
                aux.as_ptr(),
                vars,
                rows.start,
                rows.end,
                out.as_mut_ptr(),
            )
        };
        count as usize
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("result_type", &self.result_type)
            .field("pool", &self._pool)
            .finish()
    }
}

/// Decodes packed wire records and compiles them.
pub fn compile_filter_records(bytes: &[u8], config: &JitConfig) -> JitResult<CompiledFilter> {
    let stream = Instruction::decode_stream(bytes)?;
    compile_filter(&stream, config)
}

/// Compiles a predicate stream into a native row filter.
pub fn compile_filter(stream: &[Instruction], config: &JitConfig) -> JitResult<CompiledFilter> {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("opt_level", config.opt_level.as_setting())
        .map_err(|e| JitError::Setup(e.to_string()))?;
    flag_builder
        .set("is_pic", "false")
        .map_err(|e| JitError::Setup(e.to_string()))?;

    let isa_builder = cranelift_native::builder().map_err(|e| JitError::Setup(e.to_string()))?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| JitError::Setup(e.to_string()))?;

    let builder = JITBuilder::with_isa(isa, default_libcall_names());
    let mut module = JITModule::new(builder);
    let mut ctx = module.make_context();
    let mut func_ctx = FunctionBuilderContext::new();
    let mut pool = ConstPool::new();

    let ptr_type = module.target_config().pointer_type();

    ctx.func.signature.params = vec![
        AbiParam::new(ptr_type),   // column_table
        AbiParam::new(ptr_type),   // aux_table
        AbiParam::new(ptr_type),   // vars
        AbiParam::new(types::I64), // row_start
        AbiParam::new(types::I64), // row_end
        AbiParam::new(ptr_type),   // out_rows
    ];
    ctx.func.signature.returns = vec![AbiParam::new(types::I64)];

    let func_id = module
        .declare_function("predjit_filter", Linkage::Local, &ctx.func.signature)
        .map_err(|e| JitError::Codegen(e.to_string()))?;

    let result_type;
    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);

        let entry_block = builder.create_block();
        let loop_header = builder.create_block();
        let loop_body = builder.create_block();
        let loop_pass = builder.create_block();
        let loop_inc = builder.create_block();
        let exit_block = builder.create_block();

        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);

        let params = builder.block_params(entry_block).to_vec();
        let (column_table, aux_table, vars) = (params[0], params[1], params[2]);
        let (row_start, row_end, out_rows) = (params[3], params[4], params[5]);

        let var_row = builder.declare_var(types::I64);
        let var_count = builder.declare_var(types::I64);
        builder.def_var(var_row, row_start);
        let zero = builder.ins().iconst(types::I64, 0);
        builder.def_var(var_count, zero);
        builder.ins().jump(loop_header, &[]);

        // Loop header: row < row_end
        builder.switch_to_block(loop_header);
        let row = builder.use_var(var_row);
        let in_range = builder.ins().icmp(IntCC::SignedLessThan, row, row_end);
        builder.ins().brif(in_range, loop_body, &[], exit_block, &[]);

        // Loop body: the predicate itself.
        builder.switch_to_block(loop_body);
        let row = builder.use_var(var_row);
        let regs = FrameRegisters {
            column_table,
            aux_table,
            vars,
            row,
        };
        let mut asm = Asm::new(&mut builder, &mut pool);
        let mut stack = OperandStack::new();
        let top = emit_code(&mut asm, stream, &mut stack, config.null_check, &regs)?
            .ok_or(JitError::EmptyPredicate)?;
        let result = load_value(&mut asm, top);
        if !matches!(result.dtype.rank(), Some(Rank::Int32 | Rank::Int64)) {
            return Err(JitError::NonBooleanResult(result.dtype.to_string()));
        }
        result_type = result.dtype;
        let flag = result.as_reg()?;
        asm.branch_nonzero(flag, loop_pass, loop_inc);

        // Loop pass: out_rows[count] = row, count += 1.
        builder.switch_to_block(loop_pass);
        let count = builder.use_var(var_count);
        let row = builder.use_var(var_row);
        let out_offset = builder.ins().ishl_imm(count, 3);
        let out_addr = builder.ins().iadd(out_rows, out_offset);
        builder.ins().store(MemFlags::trusted(), row, out_addr, 0);
        let count_inc = builder.ins().iadd_imm(count, 1);
        builder.def_var(var_count, count_inc);
        builder.ins().jump(loop_inc, &[]);

        // Loop increment: row += 1, back to header.
        builder.switch_to_block(loop_inc);
        let row = builder.use_var(var_row);
        let row_next = builder.ins().iadd_imm(row, 1);
        builder.def_var(var_row, row_next);
        builder.ins().jump(loop_header, &[]);

        // Exit: return count.
        builder.switch_to_block(exit_block);
        let count = builder.use_var(var_count);
        builder.ins().return_(&[count]);

        builder.seal_all_blocks();
        builder.finalize();
    }

    if config.dump_ir {
        tracing::debug!("predicate IR:\n{}", ctx.func.display());
    }

    module
        .define_function(func_id, &mut ctx)
        .map_err(|e| JitError::Codegen(e.to_string()))?;
    module
        .finalize_definitions()
        .map_err(|e| JitError::Codegen(e.to_string()))?;

    let raw_ptr = module.get_finalized_function(func_id);
    // SAFETY: The function signature matches the declared Cranelift signature
    // exactly. `_module` and `_pool` keep the code and its constants alive.
    let fn_ptr = unsafe { std::mem::transmute::<*const u8, FilterFn>(raw_ptr) };

    tracing::debug!(
        instructions = stream.len(),
        pooled = pool.len(),
        result = %result_type,
        "compiled filter"
    );

    Ok(CompiledFilter {
        fn_ptr,
        _module: module,
        _pool: pool,
        result_type,
    })
}
