// fathom-config/src/docs.rs
// ============================================================================
// Module: Fathom Config Documentation
// Description: Renders the effective option table as markdown.
// Purpose: Back the `fathom config --show` CLI command.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! [`config_docs_markdown`] renders a [`crate::config::Config`]'s effective
//! values as a markdown table, in the order documented in `spec.md` §4.1.

use crate::config::Config;

/// Renders `config`'s effective option values as a two-column markdown
/// table.
#[must_use]
pub fn config_docs_markdown(config: &Config) -> String {
    let mut out = String::from("| option | value |\n|---|---|\n");
    for (name, value) in config.describe() {
        out.push_str(&format!("| `{name}` | `{value}` |\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::config_docs_markdown;
    use crate::config::Config;
    use crate::config::ConfigOverrides;
    use crate::config::Preset;

    #[test]
    fn renders_every_described_field() {
        let config = Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load");
        let markdown = config_docs_markdown(&config);
        assert!(markdown.contains("sample_rate"));
        assert!(markdown.contains("batch_size"));
        assert!(markdown.starts_with("| option | value |"));
    }
}
