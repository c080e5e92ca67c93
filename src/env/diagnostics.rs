//! Runtime environment diagnostics for bug reports and the cluster UI.

use crate::config::settings::EngineConfig;

/// Snapshot of the node's runtime surroundings: four named sections, each
/// an internally sorted list of (name, value) pairs. Collection reads but
/// never mutates.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    /// Platform and process identification.
    pub runtime: Vec<(String, String)>,
    /// Effective engine configuration.
    pub engine_config: Vec<(String, String)>,
    /// Process environment variables that are not engine configuration.
    pub system_env: Vec<(String, String)>,
    /// Executable search path entries.
    pub search_path: Vec<(String, String)>,
}

impl DiagnosticReport {
    pub fn collect(config: &EngineConfig) -> Self {
        let mut runtime = vec![
            ("crate.version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ("os.arch".to_string(), std::env::consts::ARCH.to_string()),
            ("os.family".to_string(), std::env::consts::FAMILY.to_string()),
            ("os.name".to_string(), std::env::consts::OS.to_string()),
            ("process.id".to_string(), std::process::id().to_string()),
        ];
        if let Ok(dir) = std::env::current_dir() {
            runtime.push(("process.cwd".to_string(), dir.display().to_string()));
        }
        runtime.sort();

        // Already sorted by the config snapshot.
        let engine_config = config.entries();

        let mut system_env: Vec<(String, String)> = std::env::vars()
            .filter(|(name, _)| !name.starts_with("ENGINE_"))
            .collect();
        system_env.sort();

        let mut search_path: Vec<(String, String)> = std::env::var("PATH")
            .unwrap_or_default()
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| {
                let state = if std::path::Path::new(dir).is_dir() {
                    "present"
                } else {
                    "missing"
                };
                (dir.to_string(), state.to_string())
            })
            .collect();
        search_path.sort();
        search_path.dedup();

        Self {
            runtime,
            engine_config,
            system_env,
            search_path,
        }
    }

    /// The four sections in display order.
    pub fn sections(&self) -> Vec<(&'static str, &[(String, String)])> {
        vec![
            ("Runtime Information", self.runtime.as_slice()),
            ("Engine Properties", self.engine_config.as_slice()),
            ("System Environment", self.system_env.as_slice()),
            ("Search Path", self.search_path.as_slice()),
        ]
    }
}

impl std::fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (title, pairs) in self.sections() {
            writeln!(f, "=== {} ===", title)?;
            for (name, value) in pairs {
                writeln!(f, "{} = {}", name, value)?;
            }
        }
        Ok(())
    }
}
