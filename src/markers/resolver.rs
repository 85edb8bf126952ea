use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::markers::MarkerSet;
use crate::config::PipelineConfig;
use crate::core::types::{Domain, GenomeId};
use crate::markers::MarkerHit;
use crate::utils::validation::count_to_f64;

/// Bit scores are reported with limited precision; a gap this close to the
/// threshold counts as reaching it.
const SCORE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStatus {
    Usable,
    InsufficientMarkers,
}

/// Markers retained for one genome against one domain's marker set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSummary {
    pub genome: GenomeId,
    pub domain: Domain,
    /// Best retained hit per marker id
    pub retained: BTreeMap<String, MarkerHit>,
    /// Loci dropped because their best profiles scored too closely
    pub ambiguous_loci: BTreeSet<String>,
    /// Markers retained on more than one locus
    pub multi_copy: BTreeSet<String>,
    /// Size of the domain's marker set
    pub marker_count: usize,
    pub status: MarkerStatus,
}

impl MarkerSummary {
    #[must_use]
    pub fn usable_markers(&self) -> usize {
        self.retained.len()
    }

    /// Fraction of the marker set that was retained
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.marker_count == 0 {
            return 0.0;
        }
        count_to_f64(self.retained.len()) / count_to_f64(self.marker_count)
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.status == MarkerStatus::Usable
    }
}

/// Minimum number of markers a genome needs: `ceil(count * percent / 100)`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn usability_floor(marker_count: usize, percent: f64) -> usize {
    let floor = (count_to_f64(marker_count) * percent / 100.0).ceil();
    floor.max(0.0) as usize
}

/// Collapses raw HMM hits into per-genome marker summaries for one domain
#[derive(Debug, Clone)]
pub struct MarkerHitResolver<'a> {
    domain: Domain,
    markers: &'a MarkerSet,
    multihit_threshold: f64,
    floor: usize,
}

impl<'a> MarkerHitResolver<'a> {
    #[must_use]
    pub fn new(domain: Domain, markers: &'a MarkerSet, config: &PipelineConfig) -> Self {
        Self {
            domain,
            markers,
            multihit_threshold: config.multihit_threshold,
            floor: usability_floor(markers.len(), config.domain_threshold),
        }
    }

    #[must_use]
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Resolve hits for every genome they mention, ordered by genome id
    #[must_use]
    pub fn resolve(&self, hits: &[MarkerHit]) -> Vec<MarkerSummary> {
        let mut by_genome: BTreeMap<&GenomeId, Vec<&MarkerHit>> = BTreeMap::new();
        for hit in hits {
            by_genome.entry(&hit.genome).or_default().push(hit);
        }
        by_genome
            .into_iter()
            .map(|(genome, hits)| self.resolve_genome(genome, &hits))
            .collect()
    }

    /// Resolve the hits of a single genome
    #[must_use]
    pub fn resolve_genome(&self, genome: &GenomeId, hits: &[&MarkerHit]) -> MarkerSummary {
        // Keep only this domain's markers, keyed by normalized id
        let mut by_locus: BTreeMap<&str, Vec<(String, &MarkerHit)>> = BTreeMap::new();
        for &hit in hits {
            if hit.domain.is_some_and(|d| d != self.domain) {
                continue;
            }
            if let Some(marker) = self.markers.resolve(&hit.hmm_id) {
                by_locus.entry(hit.locus.as_str()).or_default().push((marker, hit));
            }
        }

        let mut ambiguous_loci = BTreeSet::new();
        let mut candidates: BTreeMap<String, Vec<&MarkerHit>> = BTreeMap::new();

        for (locus, mut locus_hits) in by_locus {
            locus_hits.sort_by(|a, b| a.1.start.cmp(&b.1.start).then(a.1.end.cmp(&b.1.end)));
            match self.resolve_locus(&locus_hits) {
                Some(kept) => {
                    for (marker, hit) in kept {
                        candidates.entry(marker).or_default().push(hit);
                    }
                }
                None => {
                    debug!("{genome}: locus {locus} excluded as ambiguous");
                    ambiguous_loci.insert(locus.to_string());
                }
            }
        }

        let mut retained = BTreeMap::new();
        let mut multi_copy = BTreeSet::new();
        for (marker, mut copies) in candidates {
            let loci: BTreeSet<&str> = copies.iter().map(|h| h.locus.as_str()).collect();
            if loci.len() > 1 {
                multi_copy.insert(marker.clone());
            }
            copies.sort_by(|a, b| by_score_desc(a, b).then_with(|| a.locus.cmp(&b.locus)));
            if let Some(best) = copies.first() {
                retained.insert(marker, (*best).clone());
            }
        }

        let status = if retained.len() >= self.floor {
            MarkerStatus::Usable
        } else {
            MarkerStatus::InsufficientMarkers
        };

        MarkerSummary {
            genome: genome.clone(),
            domain: self.domain,
            retained,
            ambiguous_loci,
            multi_copy,
            marker_count: self.markers.len(),
            status,
        }
    }

    /// Best hit of every overlapping cluster on a locus, or `None` if any
    /// cluster is ambiguous. `hits` must be sorted by start.
    fn resolve_locus<'h>(
        &self,
        hits: &[(String, &'h MarkerHit)],
    ) -> Option<Vec<(String, &'h MarkerHit)>> {
        let mut kept = Vec::new();
        let mut cluster: Vec<&(String, &MarkerHit)> = Vec::new();
        let mut cluster_end = 0;

        for entry in hits {
            if !cluster.is_empty() && entry.1.start > cluster_end {
                kept.push(self.resolve_cluster(&mut cluster)?);
                cluster.clear();
            }
            cluster_end = if cluster.is_empty() {
                entry.1.end
            } else {
                cluster_end.max(entry.1.end)
            };
            cluster.push(entry);
        }
        if !cluster.is_empty() {
            kept.push(self.resolve_cluster(&mut cluster)?);
        }
        Some(kept)
    }

    fn resolve_cluster<'h>(
        &self,
        cluster: &mut [&(String, &'h MarkerHit)],
    ) -> Option<(String, &'h MarkerHit)> {
        cluster.sort_by(|a, b| by_score_desc(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
        let (best_marker, best) = cluster.first().map(|e| (&e.0, e.1))?;

        // Repeated hits of the same profile do not compete with each other
        let runner_up = cluster.iter().find(|e| &e.0 != best_marker);
        if let Some(other) = runner_up {
            let gap = best.bit_score - other.1.bit_score;
            if gap + SCORE_TOLERANCE < self.multihit_threshold {
                return None;
            }
        }
        Some((best_marker.clone(), best))
    }
}

fn by_score_desc(a: &MarkerHit, b: &MarkerHit) -> Ordering {
    b.bit_score.total_cmp(&a.bit_score)
}

/// Pick the domain a genome belongs to from its summaries against each
/// domain's marker set.
///
/// The domain with the larger retained fraction wins; ties go to Bacteria.
/// Returns `None` when no summary is usable.
#[must_use]
pub fn identify_domain(summaries: &[MarkerSummary]) -> Option<Domain> {
    let mut best: Option<&MarkerSummary> = None;
    for summary in summaries.iter().filter(|s| s.is_usable()) {
        best = match best {
            None => Some(summary),
            Some(current) => match summary.fraction().total_cmp(&current.fraction()) {
                Ordering::Greater => Some(summary),
                Ordering::Equal if summary.domain == Domain::Bacteria => Some(summary),
                _ => Some(current),
            },
        };
    }
    best.map(|s| s.domain)
}
