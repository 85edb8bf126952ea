//! Shared fixtures: a miniature reference data release.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use redtax::config::layout::REQUIRED_DIRS;
use redtax::integrity::{directory_digest, MANIFEST_FILE};
use redtax::parsing::newick::parse_newick;
use redtax::parsing::refpkg::ReferencePackage;
use redtax::{Domain, ReferenceTree};

pub const VERSION: &str = "r207";

pub const BAC_TREE: &str = "(((A1:0.1,A2:0.1)gA:0.4,(B1:0.1,B2:0.1)gB:0.4)F:0.5,\
                            ((C1:0.1,C2:0.1)gC:0.4,D1:0.5)G:0.5);";
pub const ARC_TREE: &str = "((X1:0.1,X2:0.1)gX:0.5,Y1:0.6);";

const TAXONOMY: &str = "\
A1\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__GA;s__GA alpha
A2\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__GA;s__GA beta
B1\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__GB;s__GB gamma
B2\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__GB;s__GB delta
C1\td__Bacteria;p__P1;c__C1;o__O1;f__F2;g__GC;s__GC epsilon
C2\td__Bacteria;p__P1;c__C1;o__O1;f__F2;g__GC;s__GC zeta
D1\td__Bacteria;p__P1;c__C1;o__O1;f__F2;g__GD;s__GD eta
X1\td__Archaea;p__PX;c__CX;o__OX;f__FX;g__GX;s__GX theta
X2\td__Archaea;p__PX;c__CX;o__OX;f__FX;g__GX;s__GX iota
Y1\td__Archaea;p__PX;c__CX;o__OX;f__FY;g__GY;s__GY kappa
";

/// Reference data directory with every required directory, metadata,
/// taxonomy, both reference packages and a digest manifest
pub fn reference_data(root: &Path) {
    for name in REQUIRED_DIRS {
        std::fs::create_dir_all(root.join(name)).unwrap();
    }
    std::fs::write(
        root.join("metadata").join("metadata.txt"),
        format!(
            "VERSION_DATA={VERSION}\n\
             RED_DIST_BAC_DICT={{\"p__\": 0.3, \"c__\": 0.4, \"o__\": 0.5, \"f__\": 0.6, \"g__\": 0.8}}\n\
             RED_DIST_ARC_DICT={{\"p__\": 0.3, \"c__\": 0.4, \"o__\": 0.5, \"f__\": 0.6, \"g__\": 0.8}}\n"
        ),
    )
    .unwrap();
    std::fs::write(root.join("taxonomy").join("gtdb_taxonomy.tsv"), TAXONOMY).unwrap();
    std::fs::write(root.join("radii").join("gtdb_radii.tsv"), "A1\t96.5\nA2\t95.0\n").unwrap();

    for (domain, newick) in [(Domain::Bacteria, BAC_TREE), (Domain::Archaea, ARC_TREE)] {
        let dir = root
            .join("pplacer")
            .join(format!("gtdb_{VERSION}_{}.refpkg", domain.marker_set_name()));
        ReferencePackage::create(&dir, &parse_newick(newick).unwrap(), None).unwrap();
    }

    write_manifest(root);
}

pub fn write_manifest(root: &Path) {
    let entries: Vec<String> = REQUIRED_DIRS
        .iter()
        .map(|name| format!("\"{name}\": \"{}\"", directory_digest(&root.join(name)).unwrap()))
        .collect();
    std::fs::write(root.join(MANIFEST_FILE), format!("{{{}}}", entries.join(","))).unwrap();
}

pub fn bac_tree() -> ReferenceTree {
    parse_newick(BAC_TREE).unwrap()
}

/// Edge id of the branch above `node` in `tree`
pub fn edge(tree: &ReferenceTree, node: &str) -> usize {
    tree.edge_for_node(tree.find(node).unwrap()).unwrap()
}

/// Placement table line: midpoint of the branch above `node`
pub fn placement_line(tree: &ReferenceTree, query: &str, node: &str, confidence: f64) -> String {
    format!("{query}\t{}\t0.05\t0.05\t{confidence}\n", edge(tree, node))
}

/// Placement table for the standard query set:
/// `q_high` confident on A1, `q_low` ambiguous on A2, `q_bad` on a missing edge
pub fn bac_placements(dir: &Path) -> PathBuf {
    let tree = bac_tree();
    let mut text = String::from("query\tedge\tdistal\tpendant\tlwr\n");
    text.push_str(&placement_line(&tree, "q_high", "A1", 0.99));
    text.push_str(&placement_line(&tree, "q_low", "A2", 0.55));
    text.push_str("q_bad\t999\t0.1\t0.1\t0.99\n");
    let path = dir.join("bac120.placements.tsv");
    std::fs::write(&path, text).unwrap();
    path
}

pub fn similarities(dir: &Path) -> PathBuf {
    let path = dir.join("ani.tsv");
    std::fs::write(&path, "q_high\tA2\t97.5\t0.88\nq_high\tC1\t99.9\t0.99\n").unwrap();
    path
}
