//! Derived views over the in-memory report collection: filters, citizen and
//! authority summaries, map pins and geographic clusters.

use std::cmp::Reverse;
use std::collections::HashMap;

use typed_builder::TypedBuilder;

use civicwatch_common::{haversine_km, Report, ReportStatus, Severity, User};

/// Geohash length used to bucket pins (~5km cells).
pub const CLUSTER_PRECISION: usize = 5;

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ReportFilter {
    #[builder(default, setter(strip_option))]
    pub status: Option<ReportStatus>,
    #[builder(default, setter(strip_option, into))]
    pub category: Option<String>,
    #[builder(default, setter(strip_option))]
    pub severity: Option<Severity>,
    #[builder(default, setter(strip_option, into))]
    pub reporter_id: Option<String>,
    /// Case-insensitive match on title, description or location.
    #[builder(default, setter(strip_option, into))]
    pub query: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        if self.status.is_some_and(|s| s != report.status) {
            return false;
        }
        if self.severity.is_some_and(|s| s != report.severity) {
            return false;
        }
        if let Some(category) = &self.category {
            if !report.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(reporter) = &self.reporter_id {
            if &report.reporter_id != reporter {
                return false;
            }
        }
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            let hit = [&report.title, &report.description, &report.location]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, reports: &'a [Report]) -> Vec<&'a Report> {
        reports.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Most urgent first: severity, then community score, then newest.
pub fn prioritized(reports: &[Report]) -> Vec<&Report> {
    let mut sorted: Vec<&Report> = reports.iter().collect();
    sorted.sort_by_key(|r| (Reverse(r.severity.rank()), Reverse(r.community_score()), Reverse(r.created_at)));
    sorted
}

// ---------------------------------------------------------------------------
// Citizen summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitizenStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub points: u32,
    pub support_received: u32,
}

impl CitizenStats {
    pub fn compute(reports: &[Report], user: &User) -> Self {
        let mut stats = CitizenStats {
            points: user.points,
            ..Default::default()
        };
        for report in reports.iter().filter(|r| r.reporter_id == user.id) {
            stats.total += 1;
            stats.support_received += report.support_count;
            match report.status {
                ReportStatus::New => stats.open += 1,
                ReportStatus::InProgress => stats.in_progress += 1,
                ReportStatus::Resolved => stats.resolved += 1,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Authority analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorityAnalytics {
    pub total: usize,
    pub by_status: HashMap<ReportStatus, usize>,
    pub by_severity: HashMap<Severity, usize>,
    pub by_category: HashMap<String, usize>,
    /// Resolved / total, 0.0 when there are no reports.
    pub resolution_rate: f64,
    pub average_progress: f64,
    pub unassigned_open: usize,
}

impl AuthorityAnalytics {
    pub fn compute(reports: &[Report]) -> Self {
        let mut analytics = AuthorityAnalytics {
            total: reports.len(),
            ..Default::default()
        };
        if reports.is_empty() {
            return analytics;
        }

        let mut progress_sum = 0u64;
        for report in reports {
            *analytics.by_status.entry(report.status).or_default() += 1;
            *analytics.by_severity.entry(report.severity).or_default() += 1;
            *analytics.by_category.entry(report.category.clone()).or_default() += 1;
            progress_sum += u64::from(report.progress);
            if report.status != ReportStatus::Resolved && report.assigned_unit.is_none() {
                analytics.unassigned_open += 1;
            }
        }

        let resolved = analytics.count(ReportStatus::Resolved);
        analytics.resolution_rate = resolved as f64 / reports.len() as f64;
        analytics.average_progress = progress_sum as f64 / reports.len() as f64;
        analytics
    }

    pub fn count(&self, status: ReportStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Categories by report count, ties broken alphabetically.
    pub fn top_categories(&self, limit: usize) -> Vec<(String, usize)> {
        let mut categories: Vec<(String, usize)> = self
            .by_category
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        categories.truncate(limit);
        categories
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MapPin {
    pub report_id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub status: ReportStatus,
    pub severity: Severity,
}

pub fn map_pins(reports: &[Report]) -> Vec<MapPin> {
    reports
        .iter()
        .filter(|r| r.has_coordinates())
        .map(|r| MapPin {
            report_id: r.id.clone(),
            lat: r.lat,
            lng: r.lng,
            title: r.title.clone(),
            status: r.status,
            severity: r.severity,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinCluster {
    pub geohash: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub report_ids: Vec<String>,
}

/// Bucket pins into geohash cells, largest cluster first.
pub fn cluster_pins(pins: &[MapPin], precision: usize) -> Vec<PinCluster> {
    let mut cells: HashMap<String, Vec<&MapPin>> = HashMap::new();
    for pin in pins {
        if let Ok(hash) = geohash::encode(geohash::Coord { x: pin.lng, y: pin.lat }, precision) {
            cells.entry(hash).or_default().push(pin);
        }
    }

    let mut clusters: Vec<PinCluster> = cells
        .into_iter()
        .map(|(hash, members)| {
            let n = members.len() as f64;
            PinCluster {
                center_lat: members.iter().map(|p| p.lat).sum::<f64>() / n,
                center_lng: members.iter().map(|p| p.lng).sum::<f64>() / n,
                report_ids: members.iter().map(|p| p.report_id.clone()).collect(),
                geohash: hash,
            }
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.report_ids
            .len()
            .cmp(&a.report_ids.len())
            .then_with(|| a.geohash.cmp(&b.geohash))
    });
    clusters
}

/// Reports within `radius_km` of a point, nearest first.
pub fn nearby(reports: &[Report], lat: f64, lng: f64, radius_km: f64) -> Vec<(&Report, f64)> {
    let mut hits: Vec<(&Report, f64)> = reports
        .iter()
        .filter(|r| r.has_coordinates())
        .map(|r| (r, haversine_km(lat, lng, r.lat, r.lng)))
        .filter(|(_, d)| *d <= radius_km)
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_report, sample_user};
    use chrono::{Duration, Utc};

    fn fixture() -> Vec<Report> {
        let mut a = sample_report("a");
        a.category = "Roads".into();
        a.severity = Severity::High;
        a.title = "Pothole on MG Road".into();

        let mut b = sample_report("b").with_progress(100);
        b.category = "Waste".into();
        b.reporter_id = "u2".into();
        b.assigned_unit = Some("Crew 1".into());
        b.location = "Station Road, Pune".into();

        let mut c = sample_report("c").with_progress(50);
        c.category = "roads".into();
        c.severity = Severity::Critical;
        c.support_count = 4;
        c.location = "FC Road, Pune".into();

        vec![a, b, c]
    }

    #[test]
    fn filter_combines_fields() {
        let reports = fixture();
        let roads = ReportFilter::builder().category("ROADS").build();
        assert_eq!(roads.apply(&reports).len(), 2);

        let open_roads = ReportFilter::builder()
            .category("roads")
            .status(ReportStatus::New)
            .build();
        assert_eq!(open_roads.apply(&reports)[0].id, "a");

        let search = ReportFilter::builder().query("mg road").build();
        let hits = search.apply(&reports);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let by_location = ReportFilter::builder().query("FC ROAD").build();
        assert_eq!(by_location.apply(&reports)[0].id, "c");

        assert_eq!(ReportFilter::default().apply(&reports).len(), 3);
    }

    #[test]
    fn prioritized_orders_by_severity_then_score_then_recency() {
        let mut reports = fixture();
        let mut d = sample_report("d");
        d.severity = Severity::High;
        d.support_count = 3;
        d.created_at = Utc::now() - Duration::days(2);
        reports.push(d);

        let ids: Vec<&str> = prioritized(&reports).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn citizen_stats_only_count_own_reports() {
        let mut user = sample_user("u1");
        user.points = 30;
        let stats = CitizenStats::compute(&fixture(), &user);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.resolved, 0);
        assert_eq!(stats.support_received, 4);
        assert_eq!(stats.points, 30);
    }

    #[test]
    fn authority_analytics_summarise() {
        let analytics = AuthorityAnalytics::compute(&fixture());
        assert_eq!(analytics.total, 3);
        assert_eq!(analytics.count(ReportStatus::Resolved), 1);
        assert!((analytics.resolution_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((analytics.average_progress - 50.0).abs() < 1e-9);
        assert_eq!(analytics.unassigned_open, 2);
        assert_eq!(analytics.top_categories(1), vec![("Roads".to_string(), 1)]);
    }

    #[test]
    fn empty_analytics_have_zero_rate() {
        let analytics = AuthorityAnalytics::compute(&[]);
        assert_eq!(analytics.resolution_rate, 0.0);
        assert!(analytics.top_categories(3).is_empty());
    }

    #[test]
    fn pins_skip_reports_without_coordinates() {
        let mut reports = fixture();
        reports[0].lat = 0.0;
        reports[0].lng = 0.0;
        assert_eq!(map_pins(&reports).len(), 2);
    }

    #[test]
    fn clusters_group_close_pins() {
        let mut reports = fixture();
        reports[2].lat = 19.0760;
        reports[2].lng = 72.8777;
        let clusters = cluster_pins(&map_pins(&reports), CLUSTER_PRECISION);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].report_ids.len(), 2);
    }

    #[test]
    fn nearby_sorts_by_distance() {
        let mut reports = fixture();
        reports[1].lat += 0.01;
        reports[2].lat = 19.0760;
        reports[2].lng = 72.8777;
        let hits = nearby(&reports, 18.5204, 73.8567, 5.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.id, "a");
    }
}
