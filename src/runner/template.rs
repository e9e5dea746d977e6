//! Placeholder expansion for runner arguments, environment and output paths.

use std::path::Path;

/// Values available to runner templates.
///
/// Supported placeholders: `{repo}`, `{phase}`, `{iteration}`, `{output}`,
/// `{spec}`, `{state_dir}`. Unknown placeholders are left as-is.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub repo: &'a Path,
    pub state_dir: &'a Path,
    pub phase: &'a str,
    pub iteration: u32,
    pub spec: Option<&'a str>,
    pub output: Option<&'a Path>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(repo: &'a Path, state_dir: &'a Path, phase: &'a str, iteration: u32) -> Self {
        Self {
            repo,
            state_dir,
            phase,
            iteration,
            spec: None,
            output: None,
        }
    }

    pub fn with_spec(mut self, spec: Option<&'a str>) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_output(mut self, output: &'a Path) -> Self {
        self.output = Some(output);
        self
    }

    /// Expand every known placeholder in `template`.
    pub fn render(&self, template: &str) -> String {
        let mut rendered = template
            .replace("{repo}", &self.repo.display().to_string())
            .replace("{state_dir}", &self.state_dir.display().to_string())
            .replace("{phase}", self.phase)
            .replace("{iteration}", &self.iteration.to_string())
            .replace("{spec}", self.spec.unwrap_or(""));
        if let Some(output) = self.output {
            rendered = rendered.replace("{output}", &output.display().to_string());
        }
        rendered
    }
}
