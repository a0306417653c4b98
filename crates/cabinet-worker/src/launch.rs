//! Emulator command line for an interactive session.

use std::path::PathBuf;

/// Search paths handed to the emulator. Empty entries are omitted.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub roms: Option<PathBuf>,
    pub samples: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub nvram: Option<PathBuf>,
    pub hash: Option<PathBuf>,
    pub artwork: Option<PathBuf>,
    pub plugins: Option<PathBuf>,
    pub cheats: Option<PathBuf>,
}

impl SearchPaths {
    fn pairs(&self) -> [(&'static str, Option<&PathBuf>); 8] {
        [
            ("-rompath", self.roms.as_ref()),
            ("-samplepath", self.samples.as_ref()),
            ("-cfg_directory", self.config.as_ref()),
            ("-nvram_directory", self.nvram.as_ref()),
            ("-hashpath", self.hash.as_ref()),
            ("-artpath", self.artwork.as_ref()),
            ("-pluginspath", self.plugins.as_ref()),
            ("-cheatpath", self.cheats.as_ref()),
        ]
    }
}

#[cfg(windows)]
const INPUT_PROVIDER: Option<&str> = Some("dinput");
#[cfg(not(windows))]
const INPUT_PROVIDER: Option<&str> = None;

/// What to run and how.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub machine: String,
    pub software: Option<String>,
    /// `(slot, option)` pairs, passed as `-slot option`.
    pub slot_options: Vec<(String, String)>,
    /// Native window handle to render into.
    pub attach_window: Option<String>,
    pub paths: SearchPaths,
}

impl LaunchOptions {
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            ..Default::default()
        }
    }

    /// Arguments for the emulator executable.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![self.machine.clone()];

        if let Some(software) = self.software.as_deref().filter(|s| !s.is_empty()) {
            args.push(software.to_owned());
        }

        for (slot, option) in &self.slot_options {
            args.push(format!("-{slot}"));
            args.push(option.clone());
        }

        if let Some(provider) = INPUT_PROVIDER {
            for flag in ["-keyboardprovider", "-mouseprovider", "-lightgunprovider"] {
                args.push(flag.to_owned());
                args.push(provider.to_owned());
            }
        }

        if let Some(window) = self.attach_window.as_deref().filter(|w| !w.is_empty()) {
            args.push("-attach_window".to_owned());
            args.push(window.to_owned());
        }

        for (flag, path) in self.paths.pairs() {
            if let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) {
                args.push(flag.to_owned());
                args.push(path.to_string_lossy().into_owned());
            }
        }

        args.extend(
            ["-plugin", "worker_ui", "-window", "-skip_gameinfo", "-nomouse", "-debug"]
                .map(str::to_owned),
        );
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_order() {
        let options = LaunchOptions {
            machine: "coco2b".into(),
            software: Some("zork".into()),
            slot_options: vec![("ext".into(), "fdc".into())],
            attach_window: None,
            paths: SearchPaths {
                roms: Some("/roms".into()),
                plugins: Some("/plugins".into()),
                ..Default::default()
            },
        };
        let args = options.arguments();

        assert_eq!(&args[..4], ["coco2b", "zork", "-ext", "fdc"]);
        let rompath = args.iter().position(|a| a == "-rompath").unwrap();
        let plugins = args.iter().position(|a| a == "-pluginspath").unwrap();
        assert!(rompath < plugins);
        assert_eq!(args[rompath + 1], "/roms");
        assert!(!args.iter().any(|a| a == "-samplepath"));
        assert_eq!(
            &args[args.len() - 6..],
            ["-plugin", "worker_ui", "-window", "-skip_gameinfo", "-nomouse", "-debug"]
        );
    }

    #[test]
    fn test_minimal_arguments() {
        let args = LaunchOptions::new("pacman").arguments();
        assert_eq!(args[0], "pacman");
        assert_eq!(args[1] == "-keyboardprovider", cfg!(windows));
        assert!(!args.iter().any(|a| a == "-attach_window"));
    }
}
