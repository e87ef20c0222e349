//! Interactive framework selection

use anyhow::{bail, Result};
use console::Term;
use dialoguer::{theme::ColorfulTheme, FuzzySelect};

use crate::frameworks::FrameworkInfo;

/// Picks one framework when detection is ambiguous
pub trait FrameworkChooser: Send + Sync {
    fn choose(&self, candidates: &[FrameworkInfo]) -> Result<FrameworkInfo>;
}

/// List entry shown for a candidate
pub fn candidate_label(candidate: &FrameworkInfo) -> String {
    format!(
        "[{}] '{}'",
        candidate.name,
        candidate.dev_command.as_deref().unwrap_or("")
    )
}

/// Fuzzy-filterable selection list on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalChooser;

impl FrameworkChooser for TerminalChooser {
    fn choose(&self, candidates: &[FrameworkInfo]) -> Result<FrameworkInfo> {
        if candidates.is_empty() {
            bail!("No frameworks to choose from");
        }

        if !Term::stderr().features().is_attended() {
            bail!(
                "Multiple possible dev commands found ({}) and no terminal to choose one. \
                 Set \"framework\" in the [dev] section of netlify.toml",
                candidates
                    .iter()
                    .map(|c| c.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let labels: Vec<String> = candidates.iter().map(candidate_label).collect();
        let index = FuzzySelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Multiple possible dev commands found")
            .items(&labels)
            .default(0)
            .interact_on(&Term::stderr())?;

        Ok(candidates[index].clone())
    }
}

/// The netlify.toml snippet that pins a chosen framework
pub fn pin_choice_hint(chosen: &FrameworkInfo) -> String {
    let dist = chosen
        .dist
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();

    format!(
        "Add 'framework' to the [dev] section of your netlify.toml to avoid this selection prompt next time:\n\n\
         [build]\n\
         command = \"{}\"\n\
         publish = \"{}\"\n\n\
         [dev]\n\
         framework = \"{}\"\n\
         command = \"{}\"\n",
        chosen.build_command.as_deref().unwrap_or(""),
        dist,
        chosen.id,
        chosen.dev_command.as_deref().unwrap_or(""),
    )
}
