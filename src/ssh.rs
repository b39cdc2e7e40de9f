//! Reachability waiter.
//!
//! After the installed domain boots, the target is polled with short SSH
//! connection attempts until one succeeds or the attempt budget runs out.
//! Built on the shared [`crate::retry`] combinator: fixed interval, fixed
//! budget, nothing adaptive.

use crate::config::SshProbeSpec;
use crate::errors::{ForgeError, ForgeResult};
use crate::retry::{Attempt, RetryPolicy, poll_until};
use crate::util::CommandRunner;
use std::time::Duration;

/// Poll until `host` accepts an SSH connection.
///
/// Returns the attempt number that succeeded; exhausting the budget is an
/// [`ForgeError::SshTimeout`].
pub async fn wait_for_ssh(
    runner: &dyn CommandRunner,
    probe: &SshProbeSpec,
    host: &str,
) -> ForgeResult<u32> {
    let policy = RetryPolicy {
        max_attempts: probe.max_attempts,
        interval: Duration::from_secs(probe.interval_secs),
    };
    let connect_timeout = format!("ConnectTimeout={}", probe.connect_timeout_secs);
    let target = format!("{}@{}", probe.user, host);

    let reached = poll_until(&policy, |attempt| {
        let connect_timeout = connect_timeout.clone();
        let target = target.clone();
        async move {
            tracing::debug!(attempt, max = probe.max_attempts, %target, "probing ssh");
            let result = runner
                .run(
                    "ssh",
                    &[
                        "-o",
                        "BatchMode=yes",
                        "-o",
                        "StrictHostKeyChecking=accept-new",
                        "-o",
                        &connect_timeout,
                        &target,
                        "exit",
                    ],
                )
                .await;
            match result {
                Ok(out) if out.success() => Attempt::Ready(attempt),
                _ => Attempt::Pending,
            }
        }
    })
    .await;

    match reached {
        Some(attempt) => {
            tracing::info!(host, attempt, "target reachable over ssh");
            Ok(attempt)
        }
        None => Err(ForgeError::SshTimeout {
            attempts: probe.max_attempts,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::CommandOutput;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// SSH that starts succeeding after a fixed number of refused attempts.
    struct FlakySsh {
        refuse_first: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CommandRunner for FlakySsh {
        async fn run(&self, program: &str, args: &[&str]) -> ForgeResult<CommandOutput> {
            assert_eq!(program, "ssh");
            assert!(args.contains(&"BatchMode=yes"));
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.refuse_first {
                Ok(CommandOutput::failed(255, "Connection refused"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        }

        async fn run_streamed(
            &self,
            _p: &str,
            _args: &[&str],
            _cwd: Option<&Path>,
        ) -> ForgeResult<Option<i32>> {
            unreachable!()
        }
    }

    fn probe(max_attempts: u32) -> SshProbeSpec {
        SshProbeSpec {
            max_attempts,
            interval_secs: 10,
            ..SshProbeSpec::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_target_uses_the_exact_budget_then_times_out() {
        let ssh = FlakySsh {
            refuse_first: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let start = tokio::time::Instant::now();

        let err = wait_for_ssh(&ssh, &probe(4), "192.168.122.10")
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::SshTimeout { attempts: 4 }));
        assert_eq!(ssh.calls.load(Ordering::SeqCst), 4);
        // Three sleeps of the configured interval between four attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_probing_once_the_target_answers() {
        let ssh = FlakySsh {
            refuse_first: 2,
            calls: AtomicU32::new(0),
        };

        let attempt = wait_for_ssh(&ssh, &probe(10), "192.168.122.10")
            .await
            .unwrap();
        assert_eq!(attempt, 3);
        assert_eq!(ssh.calls.load(Ordering::SeqCst), 3);
    }
}
