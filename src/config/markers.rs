//! Single-copy marker sets used for each domain.
//!
//! Profile names are kept exactly as they appear in the reference data's
//! marker directories; [`MarkerSet`] normalizes them to bare accessions for
//! lookup.

use std::collections::BTreeSet;

use crate::core::types::Domain;

/// Pfam profiles of the bac120 marker set
pub const BAC120_PFAM: [&str; 6] = [
    "PF00380.20.hmm", "PF00410.20.hmm", "PF00466.21.hmm", "PF01025.20.hmm",
    "PF02576.18.hmm", "PF03726.15.hmm",
];

/// TIGRFAM profiles of the bac120 marker set
pub const BAC120_TIGRFAM: [&str; 114] = [
    "TIGR00006.HMM", "TIGR00019.HMM", "TIGR00020.HMM", "TIGR00029.HMM",
    "TIGR00043.HMM", "TIGR00054.HMM", "TIGR00059.HMM", "TIGR00061.HMM",
    "TIGR00064.HMM", "TIGR00065.HMM", "TIGR00082.HMM", "TIGR00083.HMM",
    "TIGR00084.HMM", "TIGR00086.HMM", "TIGR00088.HMM", "TIGR00090.HMM",
    "TIGR00092.HMM", "TIGR00095.HMM", "TIGR00115.HMM", "TIGR00116.HMM",
    "TIGR00138.HMM", "TIGR00158.HMM", "TIGR00166.HMM", "TIGR00168.HMM",
    "TIGR00186.HMM", "TIGR00194.HMM", "TIGR00250.HMM", "TIGR00337.HMM",
    "TIGR00344.HMM", "TIGR00362.HMM", "TIGR00382.HMM", "TIGR00392.HMM",
    "TIGR00396.HMM", "TIGR00398.HMM", "TIGR00414.HMM", "TIGR00416.HMM",
    "TIGR00420.HMM", "TIGR00431.HMM", "TIGR00435.HMM", "TIGR00436.HMM",
    "TIGR00442.HMM", "TIGR00445.HMM", "TIGR00456.HMM", "TIGR00459.HMM",
    "TIGR00460.HMM", "TIGR00468.HMM", "TIGR00472.HMM", "TIGR00487.HMM",
    "TIGR00496.HMM", "TIGR00539.HMM", "TIGR00580.HMM", "TIGR00593.HMM",
    "TIGR00615.HMM", "TIGR00631.HMM", "TIGR00634.HMM", "TIGR00635.HMM",
    "TIGR00643.HMM", "TIGR00663.HMM", "TIGR00717.HMM", "TIGR00755.HMM",
    "TIGR00810.HMM", "TIGR00922.HMM", "TIGR00928.HMM", "TIGR00959.HMM",
    "TIGR00963.HMM", "TIGR00964.HMM", "TIGR00967.HMM", "TIGR01009.HMM",
    "TIGR01011.HMM", "TIGR01017.HMM", "TIGR01021.HMM", "TIGR01029.HMM",
    "TIGR01032.HMM", "TIGR01039.HMM", "TIGR01044.HMM", "TIGR01059.HMM",
    "TIGR01063.HMM", "TIGR01066.HMM", "TIGR01071.HMM", "TIGR01079.HMM",
    "TIGR01082.HMM", "TIGR01087.HMM", "TIGR01128.HMM", "TIGR01146.HMM",
    "TIGR01164.HMM", "TIGR01169.HMM", "TIGR01171.HMM", "TIGR01302.HMM",
    "TIGR01391.HMM", "TIGR01393.HMM", "TIGR01394.HMM", "TIGR01510.HMM",
    "TIGR01632.HMM", "TIGR01951.HMM", "TIGR01953.HMM", "TIGR02012.HMM",
    "TIGR02013.HMM", "TIGR02027.HMM", "TIGR02075.HMM", "TIGR02191.HMM",
    "TIGR02273.HMM", "TIGR02350.HMM", "TIGR02386.HMM", "TIGR02397.HMM",
    "TIGR02432.HMM", "TIGR02729.HMM", "TIGR03263.HMM", "TIGR03594.HMM",
    "TIGR03625.HMM", "TIGR03632.HMM", "TIGR03654.HMM", "TIGR03723.HMM",
    "TIGR03725.HMM", "TIGR03953.HMM",
];

/// Pfam profiles of the ar122 marker set
pub const AR122_PFAM: [&str; 35] = [
    "PF01868.17.hmm", "PF01282.20.hmm", "PF01655.19.hmm", "PF01092.20.hmm",
    "PF01000.27.hmm", "PF00368.19.hmm", "PF00827.18.hmm", "PF01269.18.hmm",
    "PF00466.21.hmm", "PF01015.19.hmm", "PF13685.7.hmm", "PF02978.20.hmm",
    "PF04919.13.hmm", "PF01984.21.hmm", "PF04104.15.hmm", "PF00410.20.hmm",
    "PF01798.19.hmm", "PF01864.18.hmm", "PF01990.18.hmm", "PF07541.13.hmm",
    "PF04019.13.hmm", "PF00900.21.hmm", "PF01090.20.hmm", "PF02006.17.hmm",
    "PF01157.19.hmm", "PF01191.20.hmm", "PF01866.18.hmm", "PF01198.20.hmm",
    "PF01496.20.hmm", "PF00687.22.hmm", "PF03874.17.hmm", "PF01194.18.hmm",
    "PF01200.19.hmm", "PF13656.7.hmm", "PF01280.21.hmm",
];

/// TIGRFAM profiles of the ar122 marker set
pub const AR122_TIGRFAM: [&str; 87] = [
    "TIGR00468.HMM", "TIGR01060.HMM", "TIGR03627.HMM", "TIGR01020.HMM",
    "TIGR02258.HMM", "TIGR00293.HMM", "TIGR00389.HMM", "TIGR01012.HMM",
    "TIGR00490.HMM", "TIGR03677.HMM", "TIGR03636.HMM", "TIGR03722.HMM",
    "TIGR00458.HMM", "TIGR00291.HMM", "TIGR00670.HMM", "TIGR00064.HMM",
    "TIGR03629.HMM", "TIGR00021.HMM", "TIGR03672.HMM", "TIGR00111.HMM",
    "TIGR03684.HMM", "TIGR01077.HMM", "TIGR01213.HMM", "TIGR01080.HMM",
    "TIGR00501.HMM", "TIGR00729.HMM", "TIGR01038.HMM", "TIGR00270.HMM",
    "TIGR03628.HMM", "TIGR01028.HMM", "TIGR00521.HMM", "TIGR03671.HMM",
    "TIGR00240.HMM", "TIGR02390.HMM", "TIGR02338.HMM", "TIGR00037.HMM",
    "TIGR02076.HMM", "TIGR00335.HMM", "TIGR01025.HMM", "TIGR00471.HMM",
    "TIGR00336.HMM", "TIGR00522.HMM", "TIGR02153.HMM", "TIGR02651.HMM",
    "TIGR03674.HMM", "TIGR00323.HMM", "TIGR00134.HMM", "TIGR02236.HMM",
    "TIGR03683.HMM", "TIGR00491.HMM", "TIGR00658.HMM", "TIGR03680.HMM",
    "TIGR00392.HMM", "TIGR00422.HMM", "TIGR00279.HMM", "TIGR01052.HMM",
    "TIGR00442.HMM", "TIGR00308.HMM", "TIGR00398.HMM", "TIGR00456.HMM",
    "TIGR00549.HMM", "TIGR00408.HMM", "TIGR00432.HMM", "TIGR00264.HMM",
    "TIGR00982.HMM", "TIGR00324.HMM", "TIGR01952.HMM", "TIGR03626.HMM",
    "TIGR03670.HMM", "TIGR00337.HMM", "TIGR01046.HMM", "TIGR01018.HMM",
    "TIGR00936.HMM", "TIGR00463.HMM", "TIGR01309.HMM", "TIGR03653.HMM",
    "TIGR00042.HMM", "TIGR02389.HMM", "TIGR00307.HMM", "TIGR03673.HMM",
    "TIGR00373.HMM", "TIGR01008.HMM", "TIGR00283.HMM", "TIGR00425.HMM",
    "TIGR00405.HMM", "TIGR03665.HMM", "TIGR00448.HMM",
];

/// Which profile database a marker comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerSource {
    Pfam,
    Tigrfam,
}

/// The fixed set of single-copy markers for one domain
#[derive(Debug, Clone)]
pub struct MarkerSet {
    name: &'static str,
    pfam: BTreeSet<String>,
    tigrfam: BTreeSet<String>,
}

impl MarkerSet {
    /// Marker set for a domain (bac120 or ar122)
    #[must_use]
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Bacteria => Self::from_profiles("bac120", &BAC120_PFAM, &BAC120_TIGRFAM),
            Domain::Archaea => Self::from_profiles("ar122", &AR122_PFAM, &AR122_TIGRFAM),
        }
    }

    #[must_use]
    pub fn from_profiles(name: &'static str, pfam: &[&str], tigrfam: &[&str]) -> Self {
        Self {
            name,
            pfam: pfam.iter().map(|p| normalize_marker_id(p)).collect(),
            tigrfam: tigrfam.iter().map(|p| normalize_marker_id(p)).collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of markers
    #[must_use]
    pub fn len(&self) -> usize {
        self.pfam.len() + self.tigrfam.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalized id of `hmm_id` if it belongs to this set.
    ///
    /// Accepts profile file names (`PF00380.20.hmm`), versioned accessions
    /// (`PF00380.20`) and, for Pfam, unversioned accessions (`PF00380`).
    #[must_use]
    pub fn resolve(&self, hmm_id: &str) -> Option<String> {
        let id = normalize_marker_id(hmm_id);
        if self.pfam.contains(&id) || self.tigrfam.contains(&id) {
            return Some(id);
        }
        let accession = id.split('.').next().unwrap_or(&id);
        self.pfam
            .iter()
            .find(|p| p.split('.').next() == Some(accession))
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, hmm_id: &str) -> bool {
        self.resolve(hmm_id).is_some()
    }

    #[must_use]
    pub fn source(&self, marker: &str) -> Option<MarkerSource> {
        let id = self.resolve(marker)?;
        if self.pfam.contains(&id) {
            Some(MarkerSource::Pfam)
        } else {
            Some(MarkerSource::Tigrfam)
        }
    }

    /// All marker ids, Pfam first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.pfam.iter().chain(self.tigrfam.iter()).map(String::as_str)
    }
}

/// Strip profile file extensions: `TIGR00006.HMM` -> `TIGR00006`
#[must_use]
pub fn normalize_marker_id(id: &str) -> String {
    let id = id.trim();
    let lower = id.to_ascii_lowercase();
    if lower.ends_with(".hmm") {
        id[..id.len() - 4].to_string()
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_counts() {
        assert_eq!(MarkerSet::for_domain(Domain::Bacteria).len(), 120);
        assert_eq!(MarkerSet::for_domain(Domain::Archaea).len(), 122);
    }

    #[test]
    fn test_resolve_marker_ids() {
        let bac = MarkerSet::for_domain(Domain::Bacteria);
        assert_eq!(bac.resolve("TIGR00006.HMM").as_deref(), Some("TIGR00006"));
        assert_eq!(bac.resolve("TIGR00006").as_deref(), Some("TIGR00006"));
        assert_eq!(bac.resolve("PF00380.20").as_deref(), Some("PF00380.20"));
        assert_eq!(bac.resolve("PF00380").as_deref(), Some("PF00380.20"));
        assert_eq!(bac.source("PF00380"), Some(MarkerSource::Pfam));
        assert!(!bac.contains("TIGR99999"));
    }

    #[test]
    fn test_shared_markers_between_domains() {
        // PF00466.21 and TIGR00468 are in both sets
        let bac = MarkerSet::for_domain(Domain::Bacteria);
        let arc = MarkerSet::for_domain(Domain::Archaea);
        assert!(bac.contains("PF00466.21") && arc.contains("PF00466.21"));
        assert!(bac.contains("TIGR00468") && arc.contains("TIGR00468"));
        assert!(!bac.contains("PF01868.17"));
    }
}
