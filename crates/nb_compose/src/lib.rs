use std::sync::Arc;

use nb_core::compose::Composer;
use nb_core::{Error, Result};

pub mod gemini;
pub mod template;

pub use gemini::GeminiComposer;
pub use template::TemplateComposer;

/// Settings for the composition model.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

/// Select a composer by name. `template` renders offline and needs no
/// credentials; `gemini` requires an API key.
pub fn create_composer(name: &str, config: Config) -> Result<Arc<dyn Composer>> {
    match name {
        "template" => Ok(Arc::new(TemplateComposer::new())),
        "gemini" => Ok(Arc::new(GeminiComposer::new(config)?)),
        other => Err(Error::Composition(format!("Unknown composer: {}", other))),
    }
}

pub mod prelude {
    pub use super::{create_composer, Config};
    pub use nb_core::compose::{ComposeInput, Composer};
    pub use nb_core::{Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_knows_both_composers() {
        let template = create_composer("template", Config::default()).unwrap();
        assert_eq!(template.name(), "template");

        let gemini = create_composer(
            "gemini",
            Config {
                api_key: Some("k".to_string()),
                model_name: None,
            },
        )
        .unwrap();
        assert_eq!(gemini.name(), "gemini");
    }

    #[test]
    fn unknown_names_and_missing_keys_are_rejected() {
        assert!(create_composer("markov", Config::default()).is_err());
        assert!(create_composer("gemini", Config::default()).is_err());
    }
}
