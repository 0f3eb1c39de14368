use std::time::Duration;

use tokio::{process::Command, time};

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{check_provider, parsed_arg, required_arg, Provider};

const NAME: &str = "cmd";
const TARGET: &str = "discover-cmd";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Runs a shell command and reads one address per line from its stdout.
#[derive(Debug, Clone, Default)]
pub struct CmdProvider;

fn stdout_addrs(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait::async_trait]
impl Provider for CmdProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let cmdline = required_arg(args, "cmdline")?;
        let timeout = Duration::from_secs(parsed_arg(args, "timeout", DEFAULT_TIMEOUT_SECS)?);

        l.debug(
            TARGET,
            format_args!("Running {:?} with timeout {:?}", cmdline, timeout),
        );

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmdline)
            .kill_on_drop(true)
            .output();

        let output = time::timeout(timeout, output)
            .await
            .map_err(|_| {
                ProviderError::RequestFailed(format!("command timed out after {:?}", timeout))
            })?
            .map_err(|e| ProviderError::RequestFailed(format!("execute cmd error: {}", e)))?;

        if !output.status.success() {
            return Err(ProviderError::RequestFailed(format!(
                "execute cmd error: {}",
                output.status
            )));
        }

        let addrs = stdout_addrs(&output.stdout);
        l.debug(TARGET, format_args!("Found ip addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "cmd:

    provider: \"cmd\"
    cmdline:  The command line to execute to discover nodes.
    timeout:  Timeout to wait for the command to finish, in seconds (Default 5).

    The command should output the node addresses line by line through stdout.
"
    }
}
