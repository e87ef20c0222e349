//! Known frameworks and how to recognize them

use once_cell::sync::Lazy;

use crate::config::PollingStrategy;

/// Static description of a supported framework
#[derive(Debug)]
pub struct FrameworkDefinition {
    pub id: &'static str,
    pub name: &'static str,
    /// Any of these npm dependencies marks the framework as present
    pub npm_dependencies: &'static [&'static str],
    /// If any of these is present the framework is not reported
    pub excluded_npm_dependencies: &'static [&'static str],
    /// Any of these files in the project marks the framework as present
    pub config_files: &'static [&'static str],
    pub build_command: &'static str,
    pub dev_command: &'static str,
    pub port: u16,
    pub dist: &'static str,
    pub env: &'static [(&'static str, &'static str)],
    pub polling_strategies: &'static [PollingStrategy],
    pub plugins: &'static [&'static str],
}

/// Frameworks the built-in detector recognizes, in reporting order
pub static FRAMEWORKS: Lazy<Vec<FrameworkDefinition>> = Lazy::new(|| {
    vec![
        FrameworkDefinition {
            id: "next",
            name: "Next.js",
            npm_dependencies: &["next"],
            excluded_npm_dependencies: &[],
            config_files: &[],
            build_command: "next build",
            dev_command: "next",
            port: 3000,
            dist: ".next",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &["@netlify/plugin-nextjs"],
        },
        FrameworkDefinition {
            id: "gatsby",
            name: "Gatsby",
            npm_dependencies: &["gatsby"],
            excluded_npm_dependencies: &[],
            config_files: &["gatsby-config.js", "gatsby-config.ts"],
            build_command: "gatsby build",
            dev_command: "gatsby develop",
            port: 8000,
            dist: "public",
            env: &[
                ("GATSBY_LOGGER", "yurnalist"),
                ("GATSBY_PRECOMPILE_DEVELOP_FUNCTIONS", "true"),
            ],
            polling_strategies: &[PollingStrategy::Tcp, PollingStrategy::Http],
            plugins: &["@netlify/plugin-gatsby"],
        },
        FrameworkDefinition {
            id: "astro",
            name: "Astro",
            npm_dependencies: &["astro"],
            excluded_npm_dependencies: &[],
            config_files: &["astro.config.mjs", "astro.config.ts"],
            build_command: "astro build",
            dev_command: "astro dev",
            port: 4321,
            dist: "dist",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "sveltekit",
            name: "SvelteKit",
            npm_dependencies: &["@sveltejs/kit"],
            excluded_npm_dependencies: &[],
            config_files: &[],
            build_command: "vite build",
            dev_command: "vite dev",
            port: 5173,
            dist: "build",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "nuxt",
            name: "Nuxt",
            npm_dependencies: &["nuxt", "nuxt3"],
            excluded_npm_dependencies: &[],
            config_files: &[],
            build_command: "nuxt build",
            dev_command: "nuxt dev",
            port: 3000,
            dist: ".output/public",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "vite",
            name: "Vite",
            npm_dependencies: &["vite"],
            excluded_npm_dependencies: &["@sveltejs/kit", "astro", "nuxt", "nuxt3"],
            config_files: &[],
            build_command: "vite build",
            dev_command: "vite",
            port: 5173,
            dist: "dist",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "create-react-app",
            name: "Create React App",
            npm_dependencies: &["react-scripts"],
            excluded_npm_dependencies: &[],
            config_files: &[],
            build_command: "react-scripts build",
            dev_command: "react-scripts start",
            port: 3000,
            dist: "build",
            env: &[("BROWSER", "none"), ("PORT", "3000")],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "docusaurus",
            name: "Docusaurus",
            npm_dependencies: &["@docusaurus/core"],
            excluded_npm_dependencies: &[],
            config_files: &[],
            build_command: "docusaurus build",
            dev_command: "docusaurus start",
            port: 3000,
            dist: "build",
            env: &[("BROWSER", "none")],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "eleventy",
            name: "Eleventy",
            npm_dependencies: &["@11ty/eleventy"],
            excluded_npm_dependencies: &[],
            config_files: &[".eleventy.js", "eleventy.config.js"],
            build_command: "eleventy",
            dev_command: "eleventy --serve",
            port: 8080,
            dist: "_site",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
        FrameworkDefinition {
            id: "hugo",
            name: "Hugo",
            npm_dependencies: &[],
            excluded_npm_dependencies: &[],
            config_files: &["hugo.toml", "hugo.yaml", "hugo.json"],
            build_command: "hugo",
            dev_command: "hugo server -w",
            port: 1313,
            dist: "public",
            env: &[],
            polling_strategies: &[PollingStrategy::Tcp],
            plugins: &[],
        },
    ]
});

/// Look up a framework definition by id
pub fn find(id: &str) -> Option<&'static FrameworkDefinition> {
    FRAMEWORKS.iter().find(|f| f.id == id)
}

/// Comma separated list of supported ids, for error messages
pub fn supported_ids() -> String {
    FRAMEWORKS
        .iter()
        .map(|f| f.id)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = FRAMEWORKS.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), FRAMEWORKS.len());
    }

    #[test]
    fn test_find() {
        assert_eq!(find("gatsby").map(|f| f.port), Some(8000));
        assert!(find("not-a-framework").is_none());
        assert!(supported_ids().contains("hugo"));
    }
}
