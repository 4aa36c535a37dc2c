//! Mempool: temporary storage for wallet validation requests.
//!
//! A wallet first asks for a validation request (a challenge message valid
//! for the challenge window). Signing that message promotes the request to a
//! license, valid for the license window, which authorizes exactly one star
//! registration. Both live only in memory.
//!
//! Expiry is enforced twice: a scheduled timer removes the entry, and every
//! read recomputes the remaining window, so an entry whose timer has not fired
//! yet is still treated as expired.
pub mod clock;
pub mod timer;
pub mod wallet;

use clock::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use timer::{Scheduler, TimerHandle};
use tracing::{debug, info};

pub const MESSAGE_SUFFIX: &str = "starRegistry";
pub const CHALLENGE_WINDOW_SECS: u64 = 5 * 60;
pub const LICENSE_WINDOW_SECS: u64 = 30 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MempoolConfig {
    pub challenge_window: Duration,
    pub license_window: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            challenge_window: Duration::from_secs(CHALLENGE_WINDOW_SECS),
            license_window: Duration::from_secs(LICENSE_WINDOW_SECS),
        }
    }
}

/// A pending challenge as reported to the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub wallet_address: String,
    #[serde(rename = "requestTimeStamp")]
    pub request_timestamp: u64,
    pub message: String,
    /// Seconds left before the request expires; zero or less once stale.
    pub validation_window: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    pub address: String,
    #[serde(rename = "requestTimeStamp")]
    pub request_timestamp: u64,
    pub message: String,
    pub validation_window: i64,
    pub message_signature: bool,
}

/// Outcome of a signature check: a granted license, or `registerStar: false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerdict {
    pub register_star: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LicenseStatus>,
}

impl SignatureVerdict {
    pub fn rejected() -> Self {
        Self {
            register_star: false,
            status: None,
        }
    }
}

/// Identifies one granted license; see `Mempool::valid_license`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LicenseTicket(u64);

/// `<address>:<timestamp>:starRegistry`
pub fn challenge_message(address: &str, timestamp: u64) -> String {
    format!("{address}:{timestamp}:{MESSAGE_SUFFIX}")
}

struct Challenge {
    timestamp: u64,
    message: String,
}

/// License window runs from verification time, not from the challenge.
struct License {
    timestamp: u64,
    message: String,
}

struct Entry<T> {
    value: T,
    generation: u64,
    timer: TimerHandle,
}

#[derive(Default)]
struct Pools {
    pending: HashMap<String, Entry<Challenge>>,
    licenses: HashMap<String, Entry<License>>,
    generation: u64,
}

impl Pools {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn cancel_all(&mut self) {
        for entry in self.pending.values_mut() {
            entry.timer.cancel();
        }
        for entry in self.licenses.values_mut() {
            entry.timer.cancel();
        }
        self.pending.clear();
        self.licenses.clear();
    }
}

impl Drop for Pools {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[derive(Clone, Copy, Debug)]
enum Track {
    Pending,
    License,
}

/// Remove `address` from `map` if it still holds the entry of `generation`.
fn expire<T>(map: &mut HashMap<String, Entry<T>>, address: &str, generation: u64) -> bool {
    if map.get(address).is_some_and(|e| e.generation == generation) {
        map.remove(address);
        true
    } else {
        false
    }
}

fn remaining(started: u64, window: Duration, now: u64) -> i64 {
    let elapsed = now as i64 - started as i64;
    window.as_secs() as i64 - elapsed
}

/// Owns pending validation requests and granted licenses, keyed by wallet
/// address.
///
/// Clones share state. All operations take one lock for their whole
/// read-modify-write, so operations on the same address never interleave.
/// `clear` (or dropping the last clone) cancels every outstanding timer.
#[derive(Clone)]
pub struct Mempool {
    config: MempoolConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    pools: Arc<Mutex<Pools>>,
}

impl Mempool {
    pub fn new(config: MempoolConfig, clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            config,
            clock,
            scheduler,
            pools: Arc::new(Mutex::new(Pools::default())),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Return the pending request for `address`, creating it if there is none.
    ///
    /// Re-requesting while a request is pending returns it unchanged, so the
    /// window cannot be extended by asking again. A request whose window ran
    /// out before its timer fired is still returned as is, with a window of
    /// zero or less; the timer removes it.
    pub fn request_validation(&self, address: &str) -> ValidationRequest {
        let now = self.clock.now();
        let window = self.config.challenge_window;
        let mut pools = self.pools.lock();

        if let Some(entry) = pools.pending.get(address) {
            return ValidationRequest {
                wallet_address: address.to_string(),
                request_timestamp: entry.value.timestamp,
                message: entry.value.message.clone(),
                validation_window: remaining(entry.value.timestamp, window, now),
            };
        }

        let generation = pools.next_generation();
        let challenge = Challenge {
            timestamp: now,
            message: challenge_message(address, now),
        };
        let response = ValidationRequest {
            wallet_address: address.to_string(),
            request_timestamp: now,
            message: challenge.message.clone(),
            validation_window: remaining(now, window, now),
        };
        let timer = self.schedule_expiry(Track::Pending, address, generation, window);
        pools.pending.insert(
            address.to_string(),
            Entry {
                value: challenge,
                generation,
                timer,
            },
        );
        debug!(address, "validation request added");
        response
    }

    /// Check `signature` against the pending request of `address` and, when
    /// it holds, promote the request to a license.
    ///
    /// An already granted license is returned as is. A missing or expired
    /// request, or a signature that does not verify, yields
    /// `SignatureVerdict::rejected()`.
    pub fn validate_signature(&self, address: &str, signature: &str) -> SignatureVerdict {
        let now = self.clock.now();
        let mut pools = self.pools.lock();

        if let Some(entry) = pools.licenses.get(address) {
            let left = remaining(entry.value.timestamp, self.config.license_window, now);
            if left > 0 {
                return self.license_verdict(address, &entry.value, left);
            }
        }

        let Some(entry) = pools.pending.get(address) else {
            debug!(address, "no validation request to verify");
            return SignatureVerdict::rejected();
        };
        if remaining(entry.value.timestamp, self.config.challenge_window, now) <= 0 {
            debug!(address, "validation request expired");
            return SignatureVerdict::rejected();
        }
        if let Err(err) = wallet::verify_message(address, &entry.value.message, signature) {
            debug!(address, error = %err, "signature rejected");
            return SignatureVerdict::rejected();
        }

        let Some(mut request) = pools.pending.remove(address) else {
            return SignatureVerdict::rejected();
        };
        request.timer.cancel();

        if let Some(mut stale) = pools.licenses.remove(address) {
            stale.timer.cancel();
        }
        let license = License {
            timestamp: now,
            message: request.value.message,
        };
        let left = remaining(now, self.config.license_window, now);
        let verdict = self.license_verdict(address, &license, left);
        let generation = pools.next_generation();
        let timer = self.schedule_expiry(
            Track::License,
            address,
            generation,
            self.config.license_window,
        );
        pools.licenses.insert(
            address.to_string(),
            Entry {
                value: license,
                generation,
                timer,
            },
        );
        info!(address, "license granted");
        verdict
    }

    /// True iff `address` holds a license whose window has not elapsed.
    pub fn is_license_valid(&self, address: &str) -> bool {
        self.valid_license(address).is_some()
    }

    /// The unexpired license of `address`, as a ticket that can later
    /// consume exactly that license.
    pub fn valid_license(&self, address: &str) -> Option<LicenseTicket> {
        let now = self.clock.now();
        self.pools
            .lock()
            .licenses
            .get(address)
            .filter(|e| remaining(e.value.timestamp, self.config.license_window, now) > 0)
            .map(|e| LicenseTicket(e.generation))
    }

    /// Remove the license of `address`. Returns false if there was none.
    pub fn consume_license(&self, address: &str) -> bool {
        let mut pools = self.pools.lock();
        let Some(mut entry) = pools.licenses.remove(address) else {
            return false;
        };
        entry.timer.cancel();
        debug!(address, "license consumed");
        true
    }

    /// Remove the license of `address` only if it is still the one `ticket`
    /// was issued for. A license granted after the ticket is left alone.
    pub fn consume_license_if(&self, address: &str, ticket: LicenseTicket) -> bool {
        let mut pools = self.pools.lock();
        match pools.licenses.get(address) {
            Some(entry) if entry.generation == ticket.0 => {}
            _ => {
                debug!(address, "license replaced since it was checked");
                return false;
            }
        }
        let Some(mut entry) = pools.licenses.remove(address) else {
            return false;
        };
        entry.timer.cancel();
        debug!(address, "license consumed");
        true
    }

    pub fn has_pending(&self, address: &str) -> bool {
        self.pools.lock().pending.contains_key(address)
    }

    pub fn has_license(&self, address: &str) -> bool {
        self.pools.lock().licenses.contains_key(address)
    }

    /// (pending requests, licenses) currently held, expired or not.
    pub fn len(&self) -> (usize, usize) {
        let pools = self.pools.lock();
        (pools.pending.len(), pools.licenses.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0)
    }

    /// Drop every request and license and cancel their timers.
    pub fn clear(&self) {
        self.pools.lock().cancel_all();
    }

    fn license_verdict(&self, address: &str, license: &License, left: i64) -> SignatureVerdict {
        SignatureVerdict {
            register_star: true,
            status: Some(LicenseStatus {
                address: address.to_string(),
                request_timestamp: license.timestamp,
                message: license.message.clone(),
                validation_window: left,
                message_signature: true,
            }),
        }
    }

    fn schedule_expiry(
        &self,
        track: Track,
        address: &str,
        generation: u64,
        after: Duration,
    ) -> TimerHandle {
        let pools: Weak<Mutex<Pools>> = Arc::downgrade(&self.pools);
        let address = address.to_string();
        self.scheduler.schedule(
            after,
            Box::new(move || {
                let Some(pools) = pools.upgrade() else {
                    return;
                };
                let mut pools = pools.lock();
                let removed = match track {
                    Track::Pending => expire(&mut pools.pending, &address, generation),
                    Track::License => expire(&mut pools.licenses, &address, generation),
                };
                if removed {
                    debug!(address = %address, ?track, "entry expired");
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock::ManualClock;
    use timer::TokioScheduler;

    const START: u64 = 1_600_000_000;

    fn mempool() -> (Mempool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let scheduler = TokioScheduler::try_current().unwrap();
        let mempool = Mempool::new(MempoolConfig::default(), clock.clone(), Arc::new(scheduler));
        (mempool, clock)
    }

    fn new_wallet() -> (ed25519_dalek::SigningKey, String) {
        let key = wallet::generate_wallet();
        let address = wallet::address_of(&key);
        (key, address)
    }

    #[tokio::test]
    async fn request_validation_example() {
        let (mempool, _clock) = mempool();
        let request = mempool.request_validation("A");
        assert_eq!(request.wallet_address, "A");
        assert_eq!(request.request_timestamp, START);
        assert_eq!(request.message, format!("A:{START}:starRegistry"));
        assert_eq!(request.validation_window, 300);
        assert!(mempool.has_pending("A"));
    }

    #[tokio::test]
    async fn request_validation_serializes_like_the_wire() {
        let (mempool, _clock) = mempool();
        let json = serde_json::to_value(mempool.request_validation("A")).unwrap();
        assert_eq!(json["walletAddress"], "A");
        assert_eq!(json["requestTimeStamp"], START);
        assert_eq!(json["validationWindow"], 300);
    }

    #[tokio::test]
    async fn request_validation_is_idempotent_while_pending() {
        let (mempool, clock) = mempool();
        let first = mempool.request_validation("A");
        clock.advance(10);
        let second = mempool.request_validation("A");
        clock.advance(50);
        let third = mempool.request_validation("A");

        assert_eq!(first.message, second.message);
        assert_eq!(second.message, third.message);
        assert_eq!(second.request_timestamp, START);
        assert_eq!(second.validation_window, 290);
        assert_eq!(third.validation_window, 240);
        assert_eq!(mempool.len(), (1, 0));
    }

    #[tokio::test]
    async fn stale_request_is_returned_unchanged() {
        let (mempool, clock) = mempool();
        let first = mempool.request_validation("A");
        clock.advance(300);
        let again = mempool.request_validation("A");
        assert_eq!(again.message, first.message);
        assert_eq!(again.request_timestamp, START);
        assert_eq!(again.validation_window, 0);

        clock.advance(5);
        let later = mempool.request_validation("A");
        assert_eq!(later.message, first.message);
        assert_eq!(later.validation_window, -5);
        assert!(mempool.has_pending("A"));
    }

    #[tokio::test]
    async fn valid_signature_grants_license() {
        let (mempool, clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        clock.advance(20);
        let signature = wallet::sign_message(&key, &request.message);

        let verdict = mempool.validate_signature(&address, &signature);
        assert!(verdict.register_star);
        let status = verdict.status.unwrap();
        assert_eq!(status.address, address);
        assert_eq!(status.message, request.message);
        assert!(status.message_signature);
        // License window starts at verification time.
        assert_eq!(status.request_timestamp, START + 20);
        assert_eq!(status.validation_window, 1800);

        assert!(!mempool.has_pending(&address));
        assert!(mempool.is_license_valid(&address));
    }

    #[tokio::test]
    async fn license_is_returned_on_reverification() {
        let (mempool, clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        let signature = wallet::sign_message(&key, &request.message);
        let first = mempool.validate_signature(&address, &signature);
        clock.advance(100);
        let again = mempool.validate_signature(&address, "whatever");
        assert!(again.register_star);
        let (first, again) = (first.status.unwrap(), again.status.unwrap());
        assert_eq!(first.request_timestamp, again.request_timestamp);
        assert_eq!(again.validation_window, 1700);
    }

    #[tokio::test]
    async fn verdict_serialization() {
        let json = serde_json::to_string(&SignatureVerdict::rejected()).unwrap();
        assert_eq!(json, r#"{"registerStar":false}"#);

        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        let signature = wallet::sign_message(&key, &request.message);
        let json = serde_json::to_value(mempool.validate_signature(&address, &signature)).unwrap();
        assert_eq!(json["registerStar"], true);
        assert_eq!(json["status"]["messageSignature"], true);
        assert_eq!(json["status"]["address"], address.as_str());
    }

    #[tokio::test]
    async fn signature_without_request_is_rejected() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let signature = wallet::sign_message(&key, &challenge_message(&address, START));
        assert_eq!(
            mempool.validate_signature(&address, &signature),
            SignatureVerdict::rejected()
        );
        assert!(!mempool.has_license(&address));
    }

    #[tokio::test]
    async fn signature_over_wrong_message_is_rejected() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        mempool.request_validation(&address);
        let signature = wallet::sign_message(&key, &challenge_message(&address, START + 1));
        assert!(!mempool.validate_signature(&address, &signature).register_star);
        assert!(mempool.has_pending(&address));
    }

    #[tokio::test]
    async fn signature_for_wrong_address_is_rejected() {
        let (mempool, _clock) = mempool();
        let (_key, address) = new_wallet();
        let (other_key, _other) = new_wallet();
        let request = mempool.request_validation(&address);
        let signature = wallet::sign_message(&other_key, &request.message);
        assert!(!mempool.validate_signature(&address, &signature).register_star);
        assert!(!mempool.is_license_valid(&address));
    }

    #[tokio::test]
    async fn signature_after_window_is_rejected() {
        let (mempool, clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        let signature = wallet::sign_message(&key, &request.message);
        clock.advance(300);
        // Timer has not fired yet; the read-time check still refuses.
        assert!(mempool.has_pending(&address));
        assert!(!mempool.validate_signature(&address, &signature).register_star);
        assert!(!mempool.is_license_valid(&address));
    }

    #[tokio::test]
    async fn license_expires_by_read_time_check() {
        let (mempool, clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        clock.advance(1799);
        assert!(mempool.is_license_valid(&address));
        clock.advance(1);
        assert!(mempool.has_license(&address));
        assert!(!mempool.is_license_valid(&address));
    }

    #[tokio::test]
    async fn consume_license_is_one_shot() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        assert!(mempool.consume_license(&address));
        assert!(!mempool.is_license_valid(&address));
        assert!(!mempool.consume_license(&address));
        assert!(!mempool.consume_license("never-seen"));
    }

    #[tokio::test]
    async fn addresses_are_independent() {
        let (mempool, _clock) = mempool();
        let (key_a, a) = new_wallet();
        let (_key_b, b) = new_wallet();
        let request_a = mempool.request_validation(&a);
        mempool.request_validation(&b);
        mempool.validate_signature(&a, &wallet::sign_message(&key_a, &request_a.message));
        assert!(mempool.is_license_valid(&a));
        assert!(!mempool.is_license_valid(&b));
        assert!(mempool.has_pending(&b));
        assert_eq!(mempool.len(), (1, 1));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        mempool.request_validation("other");
        mempool.clear();
        assert!(mempool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_timer_removes_request() {
        let (mempool, _clock) = mempool();
        mempool.request_validation("A");
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(mempool.has_pending("A"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!mempool.has_pending("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn promotion_cancels_request_timer() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert!(mempool.has_license(&address));
        tokio::time::sleep(Duration::from_secs(1500)).await;
        tokio::task::yield_now().await;
        assert!(!mempool.has_license(&address));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_request_after_timer_removes_stale_one() {
        let (mempool, clock) = mempool();
        let first = mempool.request_validation("A");
        clock.advance(301);
        assert_eq!(mempool.request_validation("A").message, first.message);

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert!(!mempool.has_pending("A"));

        let fresh = mempool.request_validation("A");
        assert_ne!(fresh.message, first.message);
        assert_eq!(fresh.request_timestamp, START + 301);
        assert_eq!(fresh.validation_window, 300);
    }

    #[tokio::test]
    async fn ticket_consumes_only_the_license_it_was_issued_for() {
        let (mempool, clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        let ticket = mempool.valid_license(&address).unwrap();

        // The checked license lapses and a new one is granted before consumption.
        clock.advance(1800);
        assert!(mempool.valid_license(&address).is_none());
        let request = mempool.request_validation(&address);
        let verdict =
            mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        assert!(verdict.register_star);
        let renewed = mempool.valid_license(&address).unwrap();
        assert_ne!(renewed, ticket);

        assert!(!mempool.consume_license_if(&address, ticket));
        assert!(mempool.is_license_valid(&address));
        assert!(mempool.consume_license_if(&address, renewed));
        assert!(!mempool.has_license(&address));
    }

    #[tokio::test(start_paused = true)]
    async fn consumed_license_timer_is_harmless() {
        let (mempool, _clock) = mempool();
        let (key, address) = new_wallet();
        let request = mempool.request_validation(&address);
        mempool.validate_signature(&address, &wallet::sign_message(&key, &request.message));
        mempool.consume_license(&address);
        tokio::time::sleep(Duration::from_secs(1801)).await;
        tokio::task::yield_now().await;
        assert!(mempool.is_empty());
    }
}
