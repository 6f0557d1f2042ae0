// src/metrics.rs
//
// Projection of the current snapshot onto the exported metric set. The
// exporter owns a private registry; per-match series are rebuilt from scratch
// on every projection so matches that dropped off the schedule disappear from
// /metrics instead of lingering with stale values.

use std::sync::Mutex;

use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::config::AppConfig;
use crate::snapshot::Snapshot;

/// Cardinality cap on per-match series; matches beyond it are still counted
/// in `ir_league_matches_total`.
pub const MAX_EXPORTED_MATCHES: usize = 500;

pub struct Exporter {
    registry: Registry,
    matches: IntGaugeVec,
    total: IntGauge,
    duration: Gauge,
    success: IntGauge,
    /// Serializes project+render so concurrent scrapes never observe a
    /// half-projected gauge set.
    projection: Mutex<()>,
}

impl Exporter {
    pub fn new(cfg: &AppConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let matches = IntGaugeVec::new(
            Opts::new(
                "ir_league_matches",
                "Timestamp of IR football league matches",
            ),
            &["home_team", "away_team"],
        )?;
        let total = IntGauge::new(
            "ir_league_matches_total",
            "Total number of future matches found",
        )?;
        let duration = Gauge::new(
            "ir_league_scrape_duration_seconds",
            "Duration of the last scrape in seconds",
        )?;
        let success = IntGauge::new(
            "ir_league_scrape_success",
            "Whether the last scrape was successful (1) or not (0)",
        )?;
        let info = IntGaugeVec::new(
            Opts::new(
                "ir_league_exporter_info",
                "Information about the Iran League exporter",
            ),
            &["version", "label_lang", "update_interval", "timezone"],
        )?;

        registry.register(Box::new(matches.clone()))?;
        registry.register(Box::new(total.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(info.clone()))?;

        // Static identity series, independent of snapshot state.
        info.with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            &cfg.scrape.language.to_string(),
            &cfg.scrape.update_interval_minutes.to_string(),
            &cfg.scrape.timezone.to_string(),
        ])
        .set(1);

        Ok(Self {
            registry,
            matches,
            total,
            duration,
            success,
            projection: Mutex::new(()),
        })
    }

    /// Project the snapshot (if any) and encode the result, atomically with
    /// respect to other metrics scrapes.
    pub fn project_and_render(
        &self,
        snapshot: Option<&Snapshot>,
    ) -> Result<String, prometheus::Error> {
        let _guard = self.projection.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(snapshot) = snapshot {
            self.project(snapshot);
        }
        self.render()
    }

    /// Map a snapshot onto the gauges. Idempotent: projecting the same
    /// snapshot twice leaves identical values.
    pub fn project(&self, snapshot: &Snapshot) {
        self.matches.reset();
        for m in snapshot.matches.iter().take(MAX_EXPORTED_MATCHES) {
            self.matches
                .with_label_values(&[&m.home_team, &m.away_team])
                .set(m.kickoff.timestamp());
        }
        self.total.set(snapshot.total_matches as i64);
        self.duration.set(snapshot.duration.as_secs_f64());
        self.success.set(i64::from(snapshot.success));
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, HttpConfig, Language, ScrapeConfig};
    use crate::snapshot::MatchRecord;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;

    fn test_config() -> AppConfig {
        AppConfig {
            http: HttpConfig {
                host: "127.0.0.1".into(),
                port: 8000,
            },
            scrape: ScrapeConfig {
                url: "http://localhost/schedule".into(),
                connect_timeout: Duration::from_secs(5),
                read_timeout: Duration::from_secs(10),
                max_retries: 3,
                backoff_factor: 0.5,
                user_agent: "test".into(),
                language: Language::En,
                update_interval_minutes: 30,
                timezone: chrono_tz::Asia::Tehran,
            },
            auth: AuthConfig {
                username: "admin".into(),
                password: "secret".into(),
            },
            log_level: "info".into(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn snapshot_with(matches: Vec<MatchRecord>) -> Snapshot {
        Snapshot {
            total_matches: matches.len(),
            matches,
            scraped_at: t0(),
            duration: Duration::from_millis(250),
            success: true,
            error: None,
        }
    }

    fn record(home: &str, away: &str, offset_hours: i64) -> MatchRecord {
        MatchRecord {
            home_team: home.into(),
            away_team: away.into(),
            kickoff: t0() + ChronoDuration::hours(offset_hours),
        }
    }

    fn series_count(exporter: &Exporter, name: &str) -> usize {
        exporter
            .registry
            .gather()
            .iter()
            .find(|mf| mf.get_name() == name)
            .map(|mf| mf.get_metric().len())
            .unwrap_or(0)
    }

    #[test]
    fn exported_series_carry_the_expected_names() {
        let exporter = Exporter::new(&test_config()).unwrap();
        exporter.project(&snapshot_with(vec![record("A", "B", 2)]));
        let body = exporter.render().unwrap();
        for name in [
            "ir_league_matches{",
            "ir_league_matches_total",
            "ir_league_scrape_duration_seconds",
            "ir_league_scrape_success",
            "ir_league_exporter_info",
        ] {
            assert!(body.contains(name), "missing {name} in:\n{body}");
        }
        assert!(body.contains(r#"home_team="A""#));
        assert!(body.contains(r#"away_team="B""#));
    }

    #[test]
    fn projection_is_idempotent() {
        let exporter = Exporter::new(&test_config()).unwrap();
        let snap = snapshot_with(vec![record("A", "B", 2), record("C", "D", 4)]);
        exporter.project(&snap);
        let first = exporter.render().unwrap();
        exporter.project(&snap);
        let second = exporter.render().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stale_match_series_disappear_on_reprojection() {
        let exporter = Exporter::new(&test_config()).unwrap();
        exporter.project(&snapshot_with(vec![record("A", "B", 2), record("C", "D", 4)]));
        assert_eq!(series_count(&exporter, "ir_league_matches"), 2);

        exporter.project(&snapshot_with(vec![record("E", "F", 6)]));
        assert_eq!(series_count(&exporter, "ir_league_matches"), 1);
        let body = exporter.render().unwrap();
        assert!(!body.contains(r#"home_team="A""#));
    }

    #[test]
    fn failure_snapshot_projects_success_zero() {
        let exporter = Exporter::new(&test_config()).unwrap();
        let mut snap = snapshot_with(vec![record("A", "B", 2)]);
        snap.success = false;
        snap.error = Some("boom".into());
        exporter.project(&snap);
        let body = exporter.render().unwrap();
        assert!(body.contains("ir_league_scrape_success 0"));
        // Last-good matches are still enumerated.
        assert!(body.contains(r#"home_team="A""#));
    }

    #[test]
    fn per_match_series_are_capped_but_total_is_not() {
        let matches: Vec<MatchRecord> = (0..MAX_EXPORTED_MATCHES + 1)
            .map(|i| record(&format!("H{i}"), &format!("A{i}"), 1 + i as i64))
            .collect();
        let exporter = Exporter::new(&test_config()).unwrap();
        exporter.project(&snapshot_with(matches));
        assert_eq!(
            series_count(&exporter, "ir_league_matches"),
            MAX_EXPORTED_MATCHES
        );
        let body = exporter.render().unwrap();
        assert!(body.contains(&format!(
            "ir_league_matches_total {}",
            MAX_EXPORTED_MATCHES + 1
        )));
    }
}
