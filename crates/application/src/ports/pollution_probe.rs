use async_trait::async_trait;
use sans_domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeVerdict {
    /// The probe received a forged answer; the name must avoid the
    /// poisoned path.
    Polluted,
    Clean,
}

impl ProbeVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeVerdict::Polluted => "polluted",
            ProbeVerdict::Clean => "clean",
        }
    }
}

#[async_trait]
pub trait PollutionProbe: Send + Sync {
    /// `name` is canonical. Errors are not remembered by implementations.
    async fn probe(&self, name: &str) -> Result<ProbeVerdict, DomainError>;
}
