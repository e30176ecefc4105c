//! Builder scaffolding for unit tests that inspect emitted IR.

use cranelift_codegen::ir::{AbiParam, Function, Signature, UserFuncName};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};

use crate::addressor::FrameRegisters;
use crate::asm::{Asm, PTR_TYPE};
use crate::const_pool::ConstPool;

/// Runs `f` inside the entry block of a scratch function whose parameters
/// are the four frame registers, and returns the result with the IR text.
pub fn with_frame<R>(
    pool: &mut ConstPool,
    f: impl FnOnce(&mut Asm<'_, '_>, &FrameRegisters) -> R,
) -> (R, String) {
    let mut sig = Signature::new(CallConv::SystemV);
    sig.params = vec![AbiParam::new(PTR_TYPE); 4];
    let mut func = Function::with_name_signature(UserFuncName::default(), sig);
    let mut func_ctx = FunctionBuilderContext::new();

    let result = {
        let mut builder = FunctionBuilder::new(&mut func, &mut func_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        let params = builder.block_params(entry).to_vec();
        let regs = FrameRegisters {
            column_table: params[0],
            aux_table: params[1],
            vars: params[2],
            row: params[3],
        };
        let mut asm = Asm::new(&mut builder, pool);
        f(&mut asm, &regs)
    };

    (result, func.display().to_string())
}

pub fn with_builder<R>(pool: &mut ConstPool, f: impl FnOnce(&mut Asm<'_, '_>) -> R) -> R {
    with_frame(pool, |asm, _| f(asm)).0
}
