//! `code_exec` tool (§4.5 tool mapping table): run a shell command
//! synchronously with a hard timeout. Blacklisted by default — invocation
//! requires human approval (§4.5 interrupt/resume protocol).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: Option<std::collections::HashMap<String, String>>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResponse {
    pub exit_code: Option<i32>,
    pub output: String,
    pub timed_out: bool,
}

/// Environment variables an exec call is never allowed to override,
/// regardless of approval — they control dynamic linking, interpreter
/// search paths, or the shell environment itself.
fn is_dangerous_env_var(name: &str) -> bool {
    const BLOCKED: &[&str] = &[
        "LD_PRELOAD", "LD_LIBRARY_PATH", "LD_AUDIT",
        "DYLD_INSERT_LIBRARIES", "DYLD_LIBRARY_PATH", "DYLD_FRAMEWORK_PATH",
        "PATH", "HOME", "USER", "SHELL",
        "SSH_AUTH_SOCK", "SSH_AGENT_PID",
        "PYTHONPATH", "PYTHONSTARTUP", "PYTHONHOME",
        "NODE_PATH", "NODE_OPTIONS",
        "BASH_ENV", "ENV", "CDPATH", "IFS",
    ];
    BLOCKED.contains(&name.to_ascii_uppercase().as_str())
}

pub async fn code_exec(req: ExecRequest, default_timeout_sec: u64) -> Result<ExecResponse, String> {
    let timeout_sec = req.timeout_sec.unwrap_or(default_timeout_sec);

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(&req.command);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());

    if let Some(wd) = &req.workdir {
        cmd.current_dir(wd);
    }
    if let Some(env) = &req.env {
        for (k, v) in env {
            if is_dangerous_env_var(k) {
                return Err(format!("environment variable '{k}' is blocked by security policy"));
            }
            cmd.env(k, v);
        }
    }

    let child = cmd.spawn().map_err(|e| format!("failed to spawn: {e}"))?;
    let timeout = std::time::Duration::from_secs(timeout_sec);

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Ok(ExecResponse {
                exit_code: output.status.code(),
                output: combined,
                timed_out: false,
            })
        }
        Ok(Err(e)) => Err(format!("failed to wait for command: {e}")),
        Err(_) => Ok(ExecResponse {
            exit_code: None,
            output: String::new(),
            timed_out: true,
        }),
    }
}
