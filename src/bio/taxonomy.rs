/// Accession to taxonomy mapping and the pruned NCBI taxonomic tree
use crate::{LambdaError, Result};
use bit_vec::BitVec;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Initial size of the taxid presence set; grown when larger ids show up.
pub const PRESENCE_RESERVATION: usize = 2_000_000;

pub type SubjectTaxIds = SmallVec<[u32; 1]>;

/// Lookup keys for a sequence id: the id itself, the id without `.version`, and the
/// accession of `db|ACC|name` style ids (with and without version).
pub fn accession_keys(id: &str) -> Vec<&str> {
    let mut keys = vec![id];
    let parts: Vec<&str> = id.split('|').collect();
    let core = if parts.len() >= 2 {
        // sp|P12345|NAME, tr|..., ref|NP_000001.1|, gi|123|ref|NP_..|
        if parts[0] == "gi" && parts.len() >= 4 {
            parts[3]
        } else {
            parts[1]
        }
    } else {
        id
    };
    for k in [core, core.split('.').next().unwrap_or(core)] {
        if !k.is_empty() && !keys.contains(&k) {
            keys.push(k);
        }
    }
    keys
}

/// Map from accession key to subject rank.
pub fn accession_index<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (rank, id) in ids.into_iter().enumerate() {
        for key in accession_keys(id) {
            index.entry(key.to_string()).or_insert(rank);
        }
    }
    index
}

/// Result of scanning a mapping file against the loaded subjects.
#[derive(Debug, Clone)]
pub struct TaxonMapping {
    /// Taxids per subject rank; subjects without an entry stay empty
    pub staxids: Vec<SubjectTaxIds>,
    /// Bit `t` is set iff taxid `t` is referenced by at least one subject
    pub present: BitVec,
}

impl TaxonMapping {
    pub fn present_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter(|(_, set)| *set)
            .map(|(id, _)| id as u32)
    }

    pub fn mapped_subjects(&self) -> usize {
        self.staxids.iter().filter(|t| !t.is_empty()).count()
    }
}

fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| {
        LambdaError::Taxonomy(format!("cannot open {}: {}", path.display(), e))
    })?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse an accession mapping and keep only taxids referenced by loaded subjects.
///
/// `idmapping` selects the UniProt `idmapping.dat` layout, otherwise NCBI
/// `accession2taxid` is assumed.
pub fn map_accessions<R: BufRead>(
    reader: R,
    idmapping: bool,
    acc_to_rank: &HashMap<String, usize>,
    num_subjects: usize,
) -> Result<TaxonMapping> {
    let mut staxids = vec![SubjectTaxIds::new(); num_subjects];
    let mut present = BitVec::with_capacity(PRESENCE_RESERVATION);

    for line in reader.lines() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').collect();
        let (accessions, taxid): (&[&str], &str) = if idmapping {
            if fields.len() < 3 || fields[1] != "NCBI_TaxID" {
                continue;
            }
            (&fields[..1], fields[2])
        } else {
            if fields.len() < 3 {
                continue;
            }
            (&fields[..2], fields[2])
        };
        // header lines and malformed ids fall out here
        let Ok(taxid) = taxid.trim().parse::<u32>() else {
            continue;
        };

        for acc in accessions {
            if let Some(&rank) = acc_to_rank.get(*acc) {
                let ids = &mut staxids[rank];
                if !ids.contains(&taxid) {
                    ids.push(taxid);
                }
                let slot = taxid as usize;
                if slot >= present.len() {
                    present.grow(slot + 1 - present.len(), false);
                }
                present.set(slot, true);
            }
        }
    }

    Ok(TaxonMapping { staxids, present })
}

pub fn load_mapping(
    path: &Path,
    acc_to_rank: &HashMap<String, usize>,
    num_subjects: usize,
) -> Result<TaxonMapping> {
    let idmapping = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains("idmapping"))
        .unwrap_or(false);
    let mapping = map_accessions(open_text(path)?, idmapping, acc_to_rank, num_subjects)?;
    let unmapped = num_subjects - mapping.mapped_subjects();
    if unmapped > 0 {
        tracing::warn!(
            "{} of {} subjects have no entry in {}",
            unmapped,
            num_subjects,
            path.display()
        );
    }
    Ok(mapping)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxNode {
    pub parent: u32,
    pub rank: String,
    pub name: Option<String>,
    /// Distance from the root, which has height 0
    pub height: u32,
}

/// Taxonomic tree restricted to the ancestors of referenced taxids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTree {
    nodes: HashMap<u32, TaxNode>,
}

/// Parse `nodes.dmp` into `taxid -> (parent, rank)`.
pub fn parse_nodes<R: BufRead>(reader: R) -> Result<HashMap<u32, (u32, String)>> {
    let mut nodes = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let parts: Vec<&str> = line.split("\t|\t").collect();
        if parts.len() >= 3 {
            if let (Ok(taxon_id), Ok(parent_id)) =
                (parts[0].trim().parse::<u32>(), parts[1].trim().parse::<u32>())
            {
                nodes.insert(taxon_id, (parent_id, parts[2].trim_end_matches("\t|").to_string()));
            }
        }
    }
    Ok(nodes)
}

impl TaxonomyTree {
    /// Keep every node that is an ancestor (inclusive) of a present taxid.
    pub fn prune(all: &HashMap<u32, (u32, String)>, present: &BitVec) -> Self {
        let mut nodes: HashMap<u32, TaxNode> = HashMap::new();
        let mut missing = 0usize;

        for (id, set) in present.iter().enumerate() {
            if !set {
                continue;
            }
            let mut current = id as u32;
            if !all.contains_key(&current) {
                missing += 1;
                continue;
            }
            let mut steps = 0;
            while let Some((parent, rank)) = all.get(&current) {
                if nodes.contains_key(&current) {
                    break;
                }
                nodes.insert(
                    current,
                    TaxNode {
                        parent: *parent,
                        rank: rank.clone(),
                        name: None,
                        height: 0,
                    },
                );
                steps += 1;
                if *parent == current || steps > all.len() {
                    break;
                }
                current = *parent;
            }
        }
        if missing > 0 {
            tracing::warn!("{} mapped taxids are not part of the taxonomic tree", missing);
        }

        let mut tree = TaxonomyTree { nodes };
        tree.compute_heights();
        tree
    }

    fn compute_heights(&mut self) {
        let ids: Vec<u32> = self.nodes.keys().copied().collect();
        for id in ids {
            let height = self.lineage(id).len().saturating_sub(1) as u32;
            if let Some(node) = self.nodes.get_mut(&id) {
                node.height = height;
            }
        }
    }

    /// Attach scientific names from `names.dmp` to retained nodes.
    pub fn attach_names<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let parts: Vec<&str> = line.split("\t|\t").collect();
            if parts.len() >= 4 && parts[3].starts_with("scientific name") {
                if let Ok(id) = parts[0].trim().parse::<u32>() {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.name = Some(parts[1].to_string());
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the pruned tree from a taxdump directory (`nodes.dmp`, optional `names.dmp`).
    pub fn from_dump_dir(dir: &Path, present: &BitVec) -> Result<Self> {
        let nodes_path = dir.join("nodes.dmp");
        if !nodes_path.exists() {
            return Err(LambdaError::Taxonomy(format!(
                "{} does not exist",
                nodes_path.display()
            )));
        }
        let all = parse_nodes(open_text(&nodes_path)?)?;
        let mut tree = Self::prune(&all, present);
        let names_path = dir.join("names.dmp");
        if names_path.exists() {
            tree.attach_names(open_text(&names_path)?)?;
        }
        tracing::info!(
            "Pruned taxonomic tree from {} to {} nodes",
            all.len(),
            tree.len()
        );
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: u32) -> Option<&TaxNode> {
        self.nodes.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.keys().copied()
    }

    /// Path from `id` up to the root, `id` first.
    pub fn lineage(&self, id: u32) -> Vec<u32> {
        let mut lineage = Vec::new();
        let mut current = id;
        while let Some(node) = self.nodes.get(&current) {
            lineage.push(current);
            if node.parent == current || lineage.len() > self.nodes.len() {
                break;
            }
            current = node.parent;
        }
        lineage
    }

    pub fn lca(&self, a: u32, b: u32) -> Option<u32> {
        let (mut a, mut b) = (a, b);
        let (mut ha, mut hb) = (self.nodes.get(&a)?.height, self.nodes.get(&b)?.height);
        while ha > hb {
            a = self.nodes.get(&a)?.parent;
            ha -= 1;
        }
        while hb > ha {
            b = self.nodes.get(&b)?.parent;
            hb -= 1;
        }
        while a != b {
            let (na, nb) = (self.nodes.get(&a)?, self.nodes.get(&b)?);
            if na.parent == a && nb.parent == b {
                return None;
            }
            a = na.parent;
            b = nb.parent;
        }
        Some(a)
    }

    /// Lowest common ancestor of all given taxids that are part of the tree.
    pub fn lca_of<I: IntoIterator<Item = u32>>(&self, ids: I) -> Option<u32> {
        let mut acc: Option<u32> = None;
        for id in ids.into_iter().filter(|id| self.contains(*id)) {
            acc = match acc {
                None => Some(id),
                Some(current) => Some(self.lca(current, id)?),
            };
        }
        acc
    }
}
