//! Owner-only permissions for the client configuration file.
//!
//! - **POSIX**: chmod `0600`; warn when group or other bits are set.
//! - **Windows**: `icacls` ACL rewrite granting the current user (by SID)
//!   and Administrators full control; warn when other principals appear.
//! - **Skipped**: a no-op enforcer when `KSM_CONFIG_SKIP_MODE` is set.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ksm::config::{ModeConfig, ENV_SKIP_MODE, ENV_SKIP_MODE_WARNING};
use crate::ksm::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of inspecting a config file's permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeCheck {
    Ok,
    /// Readable, but other users may have access. The message explains how
    /// to fix it.
    TooOpen { message: String },
}

/// Restricts and inspects config file permissions for one platform.
pub trait FilePermissionEnforcer: Send + Sync {
    /// Limit access to the current user.
    fn set_mode(&self, path: &Path) -> Result<(), KsmError>;

    /// Fail with `PermissionDenied` if the file cannot be read; otherwise
    /// report whether its permissions are too open.
    fn check_mode(&self, path: &Path) -> Result<ModeCheck, KsmError>;
}

/// Pick the enforcer for the running platform.
pub fn platform_enforcer(config: &ModeConfig) -> Box<dyn FilePermissionEnforcer> {
    if config.skip_mode {
        return Box::new(NoopPermissionEnforcer);
    }
    native_enforcer(config.skip_mode_warning)
}

#[cfg(unix)]
fn native_enforcer(skip_warning: bool) -> Box<dyn FilePermissionEnforcer> {
    Box::new(PosixModeEnforcer::new(skip_warning))
}

#[cfg(windows)]
fn native_enforcer(skip_warning: bool) -> Box<dyn FilePermissionEnforcer> {
    Box::new(IcaclsEnforcer::new(skip_warning))
}

#[cfg(not(any(unix, windows)))]
fn native_enforcer(_skip_warning: bool) -> Box<dyn FilePermissionEnforcer> {
    Box::new(NoopPermissionEnforcer)
}

/// Emits a too-open warning at most once per enforcer.
#[derive(Debug, Default)]
struct WarnOnce(AtomicBool);

impl WarnOnce {
    fn report(&self, message: String) -> ModeCheck {
        if !self.0.swap(true, Ordering::Relaxed) {
            log::warn!("{}", message);
        }
        ModeCheck::TooOpen { message }
    }
}

fn access_denied(path: &Path) -> KsmError {
    KsmError::new(
        KsmErrorKind::PermissionDenied,
        format!("Access denied to configuration file {}.", path.display()),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  No-op
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPermissionEnforcer;

impl FilePermissionEnforcer for NoopPermissionEnforcer {
    fn set_mode(&self, _path: &Path) -> Result<(), KsmError> {
        Ok(())
    }

    fn check_mode(&self, _path: &Path) -> Result<ModeCheck, KsmError> {
        Ok(ModeCheck::Ok)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  POSIX
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(unix)]
#[derive(Debug, Default)]
pub struct PosixModeEnforcer {
    skip_warning: bool,
    warned: WarnOnce,
}

#[cfg(unix)]
impl PosixModeEnforcer {
    pub fn new(skip_warning: bool) -> Self {
        Self {
            skip_warning,
            warned: WarnOnce::default(),
        }
    }
}

#[cfg(unix)]
impl FilePermissionEnforcer for PosixModeEnforcer {
    fn set_mode(&self, path: &Path) -> Result<(), KsmError> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        log::debug!("Set mode 0600 on {}", path.display());
        Ok(())
    }

    fn check_mode(&self, path: &Path) -> Result<ModeCheck, KsmError> {
        use std::os::unix::fs::PermissionsExt;

        if path.exists() {
            if let Err(e) = std::fs::File::open(path) {
                return Err(access_denied(path).with_detail(e.to_string()));
            }
        }
        if self.skip_warning {
            return Ok(ModeCheck::Ok);
        }

        let mode = std::fs::metadata(path)?.permissions().mode() & 0o7777;
        if mode & 0o077 == 0 {
            return Ok(ModeCheck::Ok);
        }
        Ok(self.warned.report(format!(
            "The config file mode, {:04o}, is too open. It is recommended to execute \
             'chmod 0600 {}' to remove group and user access. To disable this warning, \
             set the environment variable '{}' to 'TRUE'.",
            mode,
            path.display(),
            ENV_SKIP_MODE_WARNING
        )))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Windows (icacls)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Captured output of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs for [`IcaclsEnforcer`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, KsmError>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, KsmError> {
        let output = std::process::Command::new(program)
            .args(args)
            .output()
            .map_err(|e| {
                KsmError::new(KsmErrorKind::IoError, format!("Failed to run {}: {}", program, e))
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

const ADMINISTRATORS: &str = r"BUILTIN\Administrators";

pub struct IcaclsEnforcer<R: CommandRunner = SystemCommandRunner> {
    runner: R,
    skip_warning: bool,
    warned: WarnOnce,
}

impl IcaclsEnforcer<SystemCommandRunner> {
    pub fn new(skip_warning: bool) -> Self {
        Self::with_runner(SystemCommandRunner, skip_warning)
    }
}

impl<R: CommandRunner> IcaclsEnforcer<R> {
    pub fn with_runner(runner: R, skip_warning: bool) -> Self {
        Self {
            runner,
            skip_warning,
            warned: WarnOnce::default(),
        }
    }

    /// `DOMAIN\user` of the current account, as printed by `whoami`.
    fn current_user(&self) -> Result<Option<String>, KsmError> {
        let out = self.runner.run("whoami", &[])?;
        let user = out.stdout.trim();
        Ok((!user.is_empty()).then(|| user.to_string()))
    }

    /// SID of `user` (without domain) from `wmic useraccount get name,sid`.
    fn user_sid(&self, user: &str) -> Result<Option<String>, KsmError> {
        let out = self.runner.run("wmic", &["useraccount", "get", "name,sid"])?;
        let mut lines = out.stdout.lines();
        let header = match lines.next() {
            Some(h) => h.to_lowercase(),
            None => return Ok(None),
        };
        let column = match header.find("sid") {
            Some(c) => c,
            None => return Ok(None),
        };
        let user = user.to_lowercase();
        Ok(lines
            .find(|line| line.to_lowercase().starts_with(&user))
            .and_then(|line| line.get(column..))
            .map(|sid| sid.trim().to_string())
            .filter(|sid| !sid.is_empty()))
    }
}

impl<R: CommandRunner> FilePermissionEnforcer for IcaclsEnforcer<R> {
    fn set_mode(&self, path: &Path) -> Result<(), KsmError> {
        let Some(full_user) = self.current_user()? else {
            log::info!("Cannot get current Windows user via 'whoami'");
            return Ok(());
        };
        let user = full_user.rsplit('\\').next().unwrap_or(&full_user);
        let Some(sid) = self.user_sid(user)? else {
            log::info!("Cannot find the SID for user {}", user);
            return Ok(());
        };

        let file = path.to_string_lossy().into_owned();
        let grant_user = format!("*{}:F", sid);
        let commands: [Vec<&str>; 4] = [
            vec![file.as_str(), "/inheritance:r"],
            vec![file.as_str(), "/remove:g", "Everyone:F"],
            vec![file.as_str(), "/grant:r", "Administrators:F"],
            vec![file.as_str(), "/grant:r", grant_user.as_str()],
        ];
        for args in commands.iter() {
            log::debug!("Set mode command: icacls.exe {}", args.join(" "));
            let out = self.runner.run("icacls.exe", args)?;
            if out.stderr.contains("Access is denied") {
                return Err(access_denied(path));
            }
            if !out.stdout.contains("Failed processing 0 files") {
                let mut err = KsmError::new(
                    KsmErrorKind::PermissionDenied,
                    format!(
                        "Could not change the ACL for file '{}'. Set the environmental \
                         variable '{}' to 'TRUE' to skip setting the ACL mode.",
                        file, ENV_SKIP_MODE
                    ),
                );
                if !out.stderr.trim().is_empty() {
                    err = err.with_detail(out.stderr.trim().to_string());
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn check_mode(&self, path: &Path) -> Result<ModeCheck, KsmError> {
        let file = path.to_string_lossy().into_owned();
        let out = self.runner.run("icacls", &[file.as_str()])?;
        if out.stderr.contains("Access is denied") {
            return Err(access_denied(path));
        }
        if self.skip_warning {
            return Ok(ModeCheck::Ok);
        }
        let Some(user) = self.current_user()? else {
            return Ok(ModeCheck::Ok);
        };

        let allowed = [user.to_lowercase(), ADMINISTRATORS.to_lowercase()];
        for line in out.stdout.lines() {
            if line.trim().is_empty() {
                break;
            }
            // each ACE line is aligned under the file name
            let ace = line.get(file.len()..).unwrap_or("").trim();
            let principal = ace.split(':').next().unwrap_or("").to_lowercase();
            if !allowed.contains(&principal) {
                return Ok(self.warned.report(format!(
                    "The config file mode is too open for '{file}'. Use `icacls` to remove \
                     access for other users and groups.\n\n\
                     > icacls.exe \"{file}\" /inheritance:r\n\
                     > icacls.exe \"{file}\" /remove:g Everyone:F\n\
                     > icacls.exe \"{file}\" /grant:r Administrators:F\n\
                     > icacls.exe \"{file}\" /grant:r *<USER SID>:F\n\n\
                     To disable this check, set the environmental variable '{env}' to 'TRUE'.",
                    file = file,
                    env = ENV_SKIP_MODE_WARNING
                )));
            }
        }
        Ok(ModeCheck::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned output keyed by program name and records invocations.
    #[derive(Default)]
    struct FakeRunner {
        outputs: HashMap<String, CommandOutput>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn with(mut self, program: &str, stdout: &str, stderr: &str) -> Self {
            self.outputs.insert(
                program.to_string(),
                CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, KsmError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));
            Ok(self.outputs.get(program).cloned().unwrap_or_default())
        }
    }

    const WMIC: &str = "Name   SID\nalice  S-1-5-21-111\nbob    S-1-5-21-222\n";
    const OK_ICACLS: &str = "processed file: C:\\cfg.json\nSuccessfully processed 1 files; Failed processing 0 files\n";

    #[test]
    fn noop_does_nothing() {
        let e = NoopPermissionEnforcer;
        assert!(e.set_mode(Path::new("/definitely/missing")).is_ok());
        assert_eq!(e.check_mode(Path::new("/definitely/missing")).unwrap(), ModeCheck::Ok);
    }

    #[test]
    fn skip_mode_selects_noop() {
        let cfg = ModeConfig {
            skip_mode: true,
            skip_mode_warning: false,
        };
        let e = platform_enforcer(&cfg);
        assert!(e.set_mode(Path::new("/definitely/missing")).is_ok());
    }

    #[test]
    fn icacls_set_mode_runs_four_commands() {
        let runner = FakeRunner::default()
            .with("whoami", "DESKTOP\\alice\r\n", "")
            .with("wmic", WMIC, "")
            .with("icacls.exe", OK_ICACLS, "");
        let e = IcaclsEnforcer::with_runner(runner, false);
        e.set_mode(Path::new("C:\\cfg.json")).unwrap();

        let calls = e.runner.calls.lock().unwrap();
        let icacls: Vec<&String> = calls.iter().filter(|c| c.starts_with("icacls.exe")).collect();
        assert_eq!(icacls.len(), 4);
        assert!(icacls[0].ends_with("/inheritance:r"));
        assert!(icacls[3].ends_with("/grant:r *S-1-5-21-111:F"));
    }

    #[test]
    fn icacls_set_mode_without_sid_is_skipped() {
        let runner = FakeRunner::default()
            .with("whoami", "DESKTOP\\carol", "")
            .with("wmic", WMIC, "");
        let e = IcaclsEnforcer::with_runner(runner, false);
        e.set_mode(Path::new("C:\\cfg.json")).unwrap();
        let calls = e.runner.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("icacls")));
    }

    #[test]
    fn icacls_access_denied() {
        let runner = FakeRunner::default()
            .with("whoami", "DESKTOP\\alice", "")
            .with("wmic", WMIC, "")
            .with("icacls.exe", "", "C:\\cfg.json: Access is denied.");
        let e = IcaclsEnforcer::with_runner(runner, false);
        let err = e.set_mode(Path::new("C:\\cfg.json")).unwrap_err();
        assert_eq!(err.kind, KsmErrorKind::PermissionDenied);
        assert!(err.message.contains("Access denied"));
    }

    #[test]
    fn icacls_failure_suggests_skip_variable() {
        let runner = FakeRunner::default()
            .with("whoami", "DESKTOP\\alice", "")
            .with("wmic", WMIC, "")
            .with("icacls.exe", "Successfully processed 0 files; Failed processing 1 files", "");
        let e = IcaclsEnforcer::with_runner(runner, false);
        let err = e.set_mode(Path::new("C:\\cfg.json")).unwrap_err();
        assert!(err.message.contains(ENV_SKIP_MODE));
    }

    #[test]
    fn icacls_check_flags_other_principals_once() {
        let file = "C:\\cfg.json";
        let listing = format!(
            "{f} DESKTOP\\alice:(F)\n{pad} BUILTIN\\Administrators:(F)\n{pad} Everyone:(R)\n\nSuccessfully processed 1 files",
            f = file,
            pad = " ".repeat(file.len())
        );
        let runner = FakeRunner::default()
            .with("icacls", &listing, "")
            .with("whoami", "desktop\\alice", "");
        let e = IcaclsEnforcer::with_runner(runner, false);
        let first = e.check_mode(Path::new(file)).unwrap();
        assert!(matches!(first, ModeCheck::TooOpen { ref message } if message.contains("/inheritance:r")));
        assert!(e.warned.0.load(Ordering::Relaxed));
        // still reported, only the log line is suppressed
        assert!(matches!(e.check_mode(Path::new(file)).unwrap(), ModeCheck::TooOpen { .. }));
    }

    #[test]
    fn icacls_check_accepts_owner_and_admins() {
        let file = "C:\\cfg.json";
        let listing = format!(
            "{f} DESKTOP\\alice:(F)\n{pad} BUILTIN\\Administrators:(F)\n",
            f = file,
            pad = " ".repeat(file.len())
        );
        let runner = FakeRunner::default()
            .with("icacls", &listing, "")
            .with("whoami", "DESKTOP\\alice", "");
        let e = IcaclsEnforcer::with_runner(runner, false);
        assert_eq!(e.check_mode(Path::new(file)).unwrap(), ModeCheck::Ok);
    }

    #[test]
    fn icacls_check_skip_warning() {
        let runner = FakeRunner::default().with("icacls", "C:\\cfg.json Everyone:(F)\n", "");
        let e = IcaclsEnforcer::with_runner(runner, true);
        assert_eq!(e.check_mode(Path::new("C:\\cfg.json")).unwrap(), ModeCheck::Ok);
    }

    #[cfg(unix)]
    mod posix {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;

        #[test]
        fn set_mode_gives_0600() {
            let file = tempfile::NamedTempFile::new().unwrap();
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
            let e = PosixModeEnforcer::new(false);
            e.set_mode(file.path()).unwrap();
            let mode = std::fs::metadata(file.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
            assert_eq!(e.check_mode(file.path()).unwrap(), ModeCheck::Ok);
        }

        #[test]
        fn open_mode_is_too_open() {
            let file = tempfile::NamedTempFile::new().unwrap();
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
            let e = PosixModeEnforcer::new(false);
            match e.check_mode(file.path()).unwrap() {
                ModeCheck::TooOpen { message } => {
                    assert!(message.contains("0644"));
                    assert!(message.contains("chmod 0600"));
                }
                other => panic!("expected TooOpen, got {:?}", other),
            }
        }

        #[test]
        fn skip_warning_suppresses_report() {
            let file = tempfile::NamedTempFile::new().unwrap();
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o666)).unwrap();
            let e = PosixModeEnforcer::new(true);
            assert_eq!(e.check_mode(file.path()).unwrap(), ModeCheck::Ok);
        }
    }
}
