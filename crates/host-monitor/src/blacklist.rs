//! Candidate collector hosts with temporary exclusion.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// A fixed, ordered set of hosts where members can be excluded for a while.
///
/// Iterating yields only hosts whose blacklist entry has expired (or never
/// existed), in candidate order. Expiry is checked at the moment each host is
/// reached, so a host comes back on its own once its cool-down has passed.
#[derive(Debug)]
pub struct BlacklistedSet {
    candidates: Vec<String>,
    ttl: Duration,
    blacklisted: Mutex<HashMap<String, Instant>>,
}

impl BlacklistedSet {
    /// Creates the set. Duplicate candidates keep their first position.
    pub fn new<I, S>(candidates: I, ttl: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for host in candidates {
            let host = host.into();
            if !unique.contains(&host) {
                unique.push(host);
            }
        }
        Self {
            candidates: unique,
            ttl,
            blacklisted: Mutex::new(HashMap::new()),
        }
    }

    /// Excludes `host` for the default cool-down.
    pub fn blacklist(&self, host: &str) -> bool {
        self.blacklist_for(host, self.ttl)
    }

    /// Excludes `host` until `now + ttl`, replacing any earlier expiry.
    ///
    /// Returns `false` and does nothing when `host` is not a candidate.
    pub fn blacklist_for(&self, host: &str, ttl: Duration) -> bool {
        if !self.is_candidate(host) {
            tracing::debug!(host, "Ignoring blacklist request for unknown host");
            return false;
        }
        let now = Instant::now();
        let mut blacklisted = self.blacklisted.lock().expect("poisoned");
        blacklisted.retain(|_, expiry| *expiry > now);
        blacklisted.insert(host.to_string(), now + ttl);
        true
    }

    pub fn is_candidate(&self, host: &str) -> bool {
        self.candidates.iter().any(|c| c == host)
    }

    /// Whether `host` is excluded right now.
    pub fn is_blacklisted(&self, host: &str) -> bool {
        self.blacklisted
            .lock()
            .expect("poisoned")
            .get(host)
            .is_some_and(|expiry| *expiry > Instant::now())
    }

    /// Lazily yields currently available hosts in candidate order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.candidates
            .iter()
            .map(String::as_str)
            .filter(move |host| !self.is_blacklisted(host))
    }

    /// Snapshot of the hosts available right now.
    pub fn available(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}

impl<'a> IntoIterator for &'a BlacklistedSet {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use similar_asserts::assert_eq;

    use super::*;

    fn hosts() -> Vec<&'static str> {
        vec!["1", "2", "3", "4"]
    }

    #[test]
    fn blacklisted_host_returns_after_ttl() {
        let ttl = Duration::from_millis(50);
        let set = BlacklistedSet::new(hosts(), ttl);

        set.blacklist("4");
        assert_eq!(set.iter().count(), 3);
        assert!(!set.iter().any(|h| h == "4"));

        sleep(ttl + Duration::from_millis(20));
        assert_eq!(set.iter().count(), 4, "host 4 should be back without un-blacklisting");

        set.blacklist("1");
        set.blacklist("2");
        assert_eq!(set.available(), vec!["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn blacklisting_twice_resets_expiry() {
        let set = BlacklistedSet::new(hosts(), Duration::from_millis(80));

        set.blacklist("2");
        sleep(Duration::from_millis(50));
        set.blacklist("2");
        sleep(Duration::from_millis(50));

        assert!(set.is_blacklisted("2"), "second blacklist should push expiry out");
    }

    #[test]
    fn per_call_ttl_overrides_default() {
        let set = BlacklistedSet::new(hosts(), Duration::from_secs(3600));

        set.blacklist_for("3", Duration::from_millis(10));
        sleep(Duration::from_millis(30));

        assert!(!set.is_blacklisted("3"));
        assert_eq!(set.iter().count(), 4);
    }

    #[test]
    fn unknown_host_is_ignored() {
        let set = BlacklistedSet::new(hosts(), Duration::from_secs(60));

        assert!(!set.blacklist("5"));
        assert_eq!(set.iter().count(), 4);
    }

    #[test]
    fn candidates_are_deduplicated_in_order() {
        let set = BlacklistedSet::new(["h2", "h1", "h2", "h3"], Duration::from_secs(1));

        assert_eq!(set.candidates().join(","), "h2,h1,h3");
        assert_eq!(set.candidate_count(), 3);
    }

    #[test]
    fn iteration_is_restartable() {
        let set = BlacklistedSet::new(hosts(), Duration::from_secs(60));
        set.blacklist("1");

        let first: Vec<&str> = (&set).into_iter().collect();
        let second: Vec<&str> = (&set).into_iter().collect();

        assert_eq!(first, vec!["2", "3", "4"]);
        assert_eq!(first, second);
    }
}
