/// Cranelift optimization level for generated filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// No optimization; fastest compile.
    None,
    /// Optimize for speed of the generated code.
    #[default]
    Speed,
}

impl OptLevel {
    /// Value for the Cranelift `opt_level` setting.
    pub fn as_setting(&self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
        }
    }
}

/// Configuration for compiling predicate bytecode.
#[derive(Clone, Debug)]
pub struct JitConfig {
    /// Honor null sentinels in ordering, arithmetic and widening. Default: true.
    pub null_check: bool,
    /// Cranelift optimization level. Default: speed.
    pub opt_level: OptLevel,
    /// Log the generated Cranelift IR at debug level. Default: false.
    pub dump_ir: bool,
    /// Maximum number of compiled filters kept by a filter cache. Default: 256.
    pub cache_capacity: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            null_check: true,
            opt_level: OptLevel::Speed,
            dump_ir: false,
            cache_capacity: 256,
        }
    }
}
