//! DHCP host reservation in the libvirt network.
//!
//! Pins the VM's MAC to a fixed IP so the reachability waiter and the
//! convergence inventory can address it by a stable name. Insertion is
//! best-effort: a failure is downgraded to a warning on the assumption that
//! the network was configured out of band. The downgrade is typed
//! ([`ReservationOutcome::Skipped`]) so callers and tests can still see it.

use crate::config::NetworkSpec;
use crate::errors::ForgeResult;
use crate::util::CommandRunner;

/// What the reservation stage actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Host record inserted into the live and persistent network config.
    Created,
    /// The MAC already had a record; nothing inserted. Keeps the invariant of
    /// at most one reservation per MAC across any number of runs.
    AlreadyPresent,
    /// Inspection or insertion failed and was deliberately ignored.
    Skipped { reason: String },
}

/// Ensure `mac` has a (MAC, IP, name) host record in the network, idempotently.
pub async fn ensure_reservation(
    runner: &dyn CommandRunner,
    net: &NetworkSpec,
    mac: &str,
) -> ForgeResult<ReservationOutcome> {
    let current = runner.run("virsh", &["net-dumpxml", &net.network]).await?;
    if !current.success() {
        let reason = format!(
            "could not inspect network '{}': {}",
            net.network,
            current.stderr.trim()
        );
        tracing::warn!(network = %net.network, %reason, "skipping DHCP reservation");
        return Ok(ReservationOutcome::Skipped { reason });
    }

    if current.stdout.to_lowercase().contains(&mac.to_lowercase()) {
        tracing::info!(mac, ip = %net.ip, "DHCP reservation already present");
        return Ok(ReservationOutcome::AlreadyPresent);
    }

    let host_xml = format!(
        "<host mac='{mac}' name='{}' ip='{}'/>",
        net.hostname, net.ip
    );
    let inserted = runner
        .run(
            "virsh",
            &[
                "net-update",
                &net.network,
                "add-last",
                "ip-dhcp-host",
                &host_xml,
                "--live",
                "--config",
            ],
        )
        .await?;

    if inserted.success() {
        tracing::info!(mac, ip = %net.ip, network = %net.network, "DHCP reservation created");
        Ok(ReservationOutcome::Created)
    } else {
        // Known leniency: treat as "someone else already configured it".
        let reason = inserted.stderr.trim().to_string();
        tracing::warn!(mac, %reason, "DHCP reservation insert failed, continuing anyway");
        Ok(ReservationOutcome::Skipped { reason })
    }
}
