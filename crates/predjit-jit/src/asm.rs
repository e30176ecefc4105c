//! Thin assembler facade over a Cranelift [`FunctionBuilder`].
//!
//! SSA values stand in for registers and blocks for labels. The facade adds
//! what the builder lacks: base/index/scale/displacement memory operands and a
//! constant pool for wide and floating literals.

use cranelift_codegen::ir::{types, Block, InstBuilder, MemFlags, Type, Value};
use cranelift_frontend::{FuncInstBuilder, FunctionBuilder, Variable};

use crate::const_pool::ConstPool;
use crate::value::Mem;

/// Pointer type. Column and aux tables hold 8-byte pointers.
pub const PTR_TYPE: Type = types::I64;

/// Flags for loads from column, variable and pool memory.
///
/// Column data carries no alignment guarantee (header reads land at
/// arbitrary byte offsets).
fn data_flags() -> MemFlags {
    let mut flags = MemFlags::new();
    flags.set_notrap();
    flags
}

pub struct Asm<'a, 'f> {
    pub b: &'a mut FunctionBuilder<'f>,
    pool: &'a mut ConstPool,
}

impl<'a, 'f> Asm<'a, 'f> {
    pub fn new(b: &'a mut FunctionBuilder<'f>, pool: &'a mut ConstPool) -> Self {
        Self { b, pool }
    }

    pub fn ins(&mut self) -> FuncInstBuilder<'_, 'f> {
        self.b.ins()
    }

    /// Register class of an SSA value.
    pub fn value_type(&self, v: Value) -> Type {
        self.b.func.dfg.value_type(v)
    }

    /// Integer constant of type `ty`. Narrow immediates are stored
    /// zero-extended, as the verifier requires.
    pub fn iconst(&mut self, ty: Type, v: i64) -> Value {
        let imm = match ty {
            types::I8 => i64::from(v as u8),
            types::I16 => i64::from(v as u16),
            types::I32 => i64::from(v as u32),
            _ => v,
        };
        self.b.ins().iconst(ty, imm)
    }

    /// Effective address of `mem`, excluding its displacement.
    pub fn address(&mut self, mem: &Mem) -> Value {
        match mem.index {
            None => mem.base,
            Some(index) => {
                let scaled = if mem.shift > 0 {
                    self.b.ins().ishl_imm(index, i64::from(mem.shift))
                } else {
                    index
                };
                self.b.ins().iadd(mem.base, scaled)
            }
        }
    }

    pub fn load(&mut self, ty: Type, mem: &Mem) -> Value {
        let addr = self.address(mem);
        self.b.ins().load(ty, data_flags(), addr, mem.disp)
    }

    /// Sign-extending 8-bit load into a 32-bit register.
    pub fn sload8(&mut self, mem: &Mem) -> Value {
        let addr = self.address(mem);
        self.b.ins().sload8(types::I32, data_flags(), addr, mem.disp)
    }

    /// Sign-extending 16-bit load into a 32-bit register.
    pub fn sload16(&mut self, mem: &Mem) -> Value {
        let addr = self.address(mem);
        self.b.ins().sload16(types::I32, data_flags(), addr, mem.disp)
    }

    /// Loads the pointer stored at `table + disp`.
    pub fn load_ptr(&mut self, table: Value, disp: i32) -> Value {
        self.b.ins().load(PTR_TYPE, MemFlags::trusted(), table, disp)
    }

    fn pool_mem(&mut self, addr: *const u8, size: u8) -> Mem {
        let base = self.b.ins().iconst(PTR_TYPE, addr as i64);
        Mem::new(base, None, 0, 0, size)
    }

    pub fn const_i128(&mut self, value: i128) -> Mem {
        let addr = self.pool.insert_i128(value);
        self.pool_mem(addr, 16)
    }

    pub fn const_f32(&mut self, value: f32) -> Mem {
        let addr = self.pool.insert_f32(value);
        self.pool_mem(addr, 4)
    }

    pub fn const_f64(&mut self, value: f64) -> Mem {
        let addr = self.pool.insert_f64(value);
        self.pool_mem(addr, 8)
    }

    pub fn new_label(&mut self) -> Block {
        self.b.create_block()
    }

    pub fn bind(&mut self, label: Block) {
        self.b.switch_to_block(label);
    }

    pub fn jump(&mut self, label: Block) {
        self.b.ins().jump(label, &[]);
    }

    /// Branches to `taken` when `cond` is non-zero, else to `otherwise`.
    pub fn branch_nonzero(&mut self, cond: Value, taken: Block, otherwise: Block) {
        self.b.ins().brif(cond, taken, &[], otherwise, &[]);
    }

    pub fn new_var(&mut self, ty: Type) -> Variable {
        self.b.declare_var(ty)
    }

    pub fn def_var(&mut self, var: Variable, v: Value) {
        self.b.def_var(var, v);
    }

    pub fn use_var(&mut self, var: Variable) -> Value {
        self.b.use_var(var)
    }
}
