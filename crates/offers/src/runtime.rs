/// Runtime kinds with a supported linear pricing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricedRuntime {
    Vm,
    VmNvidia,
}

/// Execution environment advertised by an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runtime {
    Priced(PricedRuntime),
    Unpriced(String),
}

impl Runtime {
    pub fn name(&self) -> &str {
        match self {
            Runtime::Priced(PricedRuntime::Vm) => "vm",
            Runtime::Priced(PricedRuntime::VmNvidia) => "vm-nvidia",
            Runtime::Unpriced(name) => name,
        }
    }

    pub fn is_priced(&self) -> bool {
        matches!(self, Runtime::Priced(_))
    }
}

impl From<&str> for Runtime {
    fn from(name: &str) -> Self {
        match name {
            "vm" => Runtime::Priced(PricedRuntime::Vm),
            "vm-nvidia" => Runtime::Priced(PricedRuntime::VmNvidia),
            other => Runtime::Unpriced(other.to_owned()),
        }
    }
}
