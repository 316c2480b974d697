use crate::{random::RandomSource, wire::PromptFormat};

/// One configured generation backend: where to reach it and which prompt
/// encoding it expects.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub address: String,
    pub format: PromptFormat,
}

impl BackendDescriptor {
    pub fn new(address: impl Into<String>, format: PromptFormat) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_owned(),
            format,
        }
    }

    pub fn completion_url(&self) -> String {
        format!("{}/completion", self.address)
    }
}

/// Fixed, read-only pool of backends built once at startup. Selection is
/// uniform random per round, through the injected random source.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<BackendDescriptor>) -> Self {
        assert!(
            !backends.is_empty(),
            "at least one backend must be configured"
        );
        Self { backends }
    }

    pub fn pick(&self, random: &dyn RandomSource) -> &BackendDescriptor {
        &self.backends[random.pick_index(self.backends.len())]
    }

    /// The first configured backend; the generic passthrough always targets it.
    pub fn primary(&self) -> &BackendDescriptor {
        &self.backends[0]
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|backend| backend.address.as_str())
    }
}
