//! Readers for edge lists and node features, and a streaming writer for
//! diffused features.  Files ending in `.gz` are transparently (de)compressed.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Result as IOResult, Write};

use fast_float::parse;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use itertools::Itertools;
use log::{info, warn};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use ryu::Buffer;

use crate::error::{DiffusionError, Result};
use crate::graph::{AdjacencyMatrix, NodeID};
use crate::vocab::Vocab;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeType {
    Directed,
    Undirected,
}

/// Streaming writer for diffused features.  One line per node:
/// `name\t[v1,v2,...]`.
pub struct FeatureWriter<'a> {
    vocab: &'a Vocab,
    output: Box<dyn Write>,
    buffer: String,
}

impl<'a> FeatureWriter<'a> {
    pub fn new(path: &str, vocab: &'a Vocab, comp_level: Option<u32>) -> IOResult<Self> {
        let encoder = open_file_for_writing(path, comp_level)?;
        Ok(FeatureWriter {
            vocab,
            output: encoder,
            buffer: String::new(),
        })
    }

    /// Writes every row of `features`.  Row i belongs to node id i.
    pub fn stream(&mut self, features: ArrayView2<f32>) -> Result<()> {
        let mut formatter = Buffer::new();

        for (node_id, row) in features.outer_iter().enumerate() {
            let name = self
                .vocab
                .get_name(node_id)
                .ok_or(DiffusionError::NodeOutOfRange { node: node_id, nodes: self.vocab.len() })?;

            self.buffer.clear();
            for (idx, wi) in row.iter().enumerate() {
                if idx > 0 {
                    self.buffer.push(',');
                }
                self.buffer.push_str(formatter.format(*wi));
            }

            writeln!(&mut self.output, "{}\t[{}]", name, self.buffer)?;
        }

        self.output.flush()?;
        Ok(())
    }
}

struct RecordReader {
    chunk_size: usize,
    skip: usize,
}

impl RecordReader {
    pub fn new(chunk_size: usize, skip: usize) -> Self {
        RecordReader { chunk_size, skip }
    }

    /// Parses lines with `mapper`, in parallel chunks when `chunk_size > 1`,
    /// and hands the records to `drain` in file order.
    pub fn read<F, D, A>(
        &self,
        mut it: impl Iterator<Item = IOResult<String>>,
        mapper: F,
        mut drain: D,
    ) -> Result<()>
    where
        F: Fn(usize, String) -> Option<Result<A>> + Sync,
        D: FnMut(usize, A) -> Result<()>,
        A: Send,
    {
        // Skip records, such as headers of tsvs
        for line in (&mut it).take(self.skip) {
            line?;
        }

        if self.chunk_size <= 1 {
            for (i, line) in it.enumerate() {
                if let Some(record) = mapper(i, line?) {
                    drain(i, record?)?
                }
            }
        } else {
            let mut i = 0;
            let mut buffer = Vec::with_capacity(self.chunk_size);
            let mut p_buffer = Vec::with_capacity(self.chunk_size);
            for chunk in &it.chunks(self.chunk_size) {
                buffer.clear();

                // Read lines into a buffer for parallelizing
                for line in chunk {
                    buffer.push(line?);
                }

                buffer
                    .par_drain(..)
                    .enumerate()
                    .map(|(idx, line)| mapper(i + idx, line))
                    .collect_into_vec(&mut p_buffer);

                for r in p_buffer.drain(..) {
                    if let Some(record) = r {
                        drain(i, record?)?;
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }
}

pub fn open_file_for_reading(path: &str) -> IOResult<Box<dyn BufRead>> {
    let f = File::open(path)?;

    let f = BufReader::new(f);
    let result: Box<dyn BufRead> = if path.ends_with(".gz") {
        let decoder = BufReader::new(GzDecoder::new(f));
        Box::new(decoder)
    } else {
        Box::new(f)
    };
    Ok(result)
}

pub fn open_file_for_writing(path: &str, compression: Option<u32>) -> IOResult<Box<dyn Write>> {
    let comp_level = compression.map(Compression::new);
    let f = File::create(path)?;
    let bw = BufWriter::new(f);
    let encoder: Box<dyn Write> = if path.ends_with(".gz") {
        let e = GzEncoder::new(bw, comp_level.unwrap_or(Compression::fast()));
        Box::new(e)
    } else {
        Box::new(bw)
    };
    Ok(encoder)
}

/// Reads a line and converts it to a node name and feature vector.
fn line_to_features(line: &str) -> Option<(String, Vec<f32>)> {
    let (name, e) = line.split_once('\t')?;
    let e = e.trim();
    if e.len() < 2 || !e.starts_with('[') || !e.ends_with(']') {
        return None;
    }

    let inner = &e[1..e.len() - 1];
    if inner.trim().is_empty() {
        return Some((name.to_string(), Vec::new()));
    }

    let feats: std::result::Result<Vec<f32>, _> = inner.split(',').map(|wi| parse(wi.trim())).collect();
    feats.ok().map(|f| (name.to_string(), f))
}

pub struct GraphReader;

impl GraphReader {
    fn deduplicate_edges(edges: &mut Vec<(NodeID, NodeID, f32)>) {
        // Sort edges and combine duplicates
        edges.par_sort_unstable_by_key(|e| (e.0, e.1));
        let mut i = 0;
        let mut j = 0;
        while j < edges.len() {
            let (from_node, to_node, _) = edges[j];
            let mut w = 0f32;
            while j < edges.len() && edges[j].0 == from_node && edges[j].1 == to_node {
                w += edges[j].2;
                j += 1
            }
            edges[i] = (from_node, to_node, w);
            i += 1;
        }
        edges.truncate(i);
    }

    /// Loads a tab separated edge list: `from\tto` or, when weighted,
    /// `from\tto\tweight`.  Undirected edges are mirrored and duplicate
    /// edges summed.
    pub fn load(
        path: &str,
        edge_type: EdgeType,
        chunk_size: usize,
        skip_rows: usize,
        weighted: bool,
    ) -> Result<(Vocab, AdjacencyMatrix)> {
        let reader = open_file_for_reading(path)?.lines();

        let mut vocab = Vocab::new();
        let mut edges = Vec::new();
        let rr = RecordReader::new(chunk_size, skip_rows);
        rr.read(
            reader,
            |i, line| {
                let pieces: Vec<_> = line.split('\t').collect();
                let expected = if weighted { 3 } else { 2 };
                if pieces.len() < expected {
                    return Some(Err(DiffusionError::Parse {
                        line: i,
                        reason: format!("expected {} fields, found {}", expected, pieces.len()),
                    }));
                }

                let w = if weighted {
                    match parse::<f32, _>(pieces[2].trim()) {
                        Ok(w) => w,
                        Err(e) => {
                            return Some(Err(DiffusionError::Parse {
                                line: i,
                                reason: format!("{:?} - {:?}", e, pieces[2]),
                            }))
                        }
                    }
                } else {
                    1f32
                };
                Some(Ok((pieces[0].to_string(), pieces[1].to_string(), w)))
            },
            |_i, (from_node, to_node, w): (String, String, f32)| {
                let f_id = vocab.get_or_insert(from_node);
                let t_id = vocab.get_or_insert(to_node);
                edges.push((f_id, t_id, w));
                if matches!(edge_type, EdgeType::Undirected) && f_id != t_id {
                    edges.push((t_id, f_id, w));
                }
                Ok(())
            },
        )?;

        GraphReader::deduplicate_edges(&mut edges);
        info!("Loaded {} nodes and {} edges from {}", vocab.len(), edges.len(), path);

        let adj = AdjacencyMatrix::with_nodes(vocab.len(), edges)?;
        Ok((vocab, adj))
    }
}

pub struct FeatureReader;

impl FeatureReader {
    /// Loads `name\t[v1,v2,...]` lines into a dense matrix with one row per
    /// node in `vocab`.  Nodes without a line get zeros; names missing from
    /// the vocabulary are skipped.
    pub fn load(path: &str, vocab: &Vocab, chunk_size: usize, skip_rows: usize) -> Result<Array2<f32>> {
        let reader = open_file_for_reading(path)?.lines();
        let mut rows: Vec<Option<Vec<f32>>> = vec![None; vocab.len()];
        let mut dims = None;

        let rr = RecordReader::new(chunk_size, skip_rows);
        rr.read(
            reader,
            |i, line| {
                Some(line_to_features(&line).ok_or_else(|| DiffusionError::Parse {
                    line: i,
                    reason: format!("error parsing features: {}", line),
                }))
            },
            |i, (name, feats): (String, Vec<f32>)| {
                let node_id = match vocab.get_node_id(&name) {
                    Some(node_id) => node_id,
                    None => {
                        warn!("Skipping features for unknown node '{}'", name);
                        return Ok(());
                    }
                };

                let d = *dims.get_or_insert(feats.len());
                if d != feats.len() {
                    return Err(DiffusionError::Parse {
                        line: i,
                        reason: format!("expected {} features, found {}", d, feats.len()),
                    });
                }
                rows[node_id] = Some(feats);
                Ok(())
            },
        )?;

        let dims = dims.unwrap_or(0);
        let mut features = Array2::zeros((vocab.len(), dims));
        for (node_id, row) in rows.into_iter().enumerate() {
            if let Some(row) = row {
                features.row_mut(node_id).iter_mut().zip(row).for_each(|(o, v)| *o = v);
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod io_tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("graph_diffusers_{}_{}", std::process::id(), name));
        p
    }

    fn write_file(name: &str, contents: &str) -> String {
        let path = temp_path(name);
        let path = path.to_str().expect("temp dir should be utf8").to_string();
        let mut out = open_file_for_writing(&path, None).unwrap();
        out.write_all(contents.as_bytes()).unwrap();
        out.flush().unwrap();
        path
    }

    #[test]
    fn parse_feature_line() {
        assert_eq!(
            line_to_features("a\t[1,2.5, -3]"),
            Some(("a".to_string(), vec![1., 2.5, -3.]))
        );
        assert_eq!(line_to_features("a\t[]"), Some(("a".to_string(), vec![])));
        assert_eq!(line_to_features("a\t1,2"), None);
        assert_eq!(line_to_features("a"), None);
        assert_eq!(line_to_features("a\t[1,x]"), None);
    }

    #[test]
    fn load_undirected_graph() {
        let path = write_file("undirected.tsv", "from\tto\na\tb\nb\tc\na\tb\n");
        let (vocab, adj) = GraphReader::load(&path, EdgeType::Undirected, 1, 1, false).unwrap();

        assert_eq!(vocab.len(), 3);
        assert_eq!(adj.dim(), 3);
        let (a, b, c) = (
            vocab.get_node_id("a").unwrap(),
            vocab.get_node_id("b").unwrap(),
            vocab.get_node_id("c").unwrap(),
        );
        assert_eq!(adj.get(a, b), Some(2.));
        assert_eq!(adj.get(b, a), Some(2.));
        assert_eq!(adj.get(c, b), Some(1.));
        assert_eq!(adj.get(a, c), None);
    }

    #[test]
    fn load_weighted_gz_graph() {
        let path = temp_path("weighted.tsv.gz");
        let path = path.to_str().unwrap().to_string();
        {
            let mut out = open_file_for_writing(&path, Some(6)).unwrap();
            for i in 0..100 {
                writeln!(out, "n{}\tn{}\t0.5", i, (i + 1) % 100).unwrap();
            }
        }

        let (vocab, adj) = GraphReader::load(&path, EdgeType::Directed, 16, 0, true).unwrap();
        assert_eq!(vocab.len(), 100);
        assert_eq!(adj.nnz(), 100);
        let n0 = vocab.get_node_id("n0").unwrap();
        let n1 = vocab.get_node_id("n1").unwrap();
        assert_eq!(adj.get(n0, n1), Some(0.5));
        assert_eq!(adj.get(n1, n0), None);
    }

    #[test]
    fn malformed_graph() {
        let path = write_file("malformed.tsv", "a\tb\t1.0\nc\n");
        let err = GraphReader::load(&path, EdgeType::Directed, 1, 0, true).unwrap_err();
        assert!(matches!(err, DiffusionError::Parse { line: 1, .. }));

        let path = write_file("bad_weight.tsv", "a\tb\tabc\n");
        assert!(GraphReader::load(&path, EdgeType::Directed, 1, 0, true).is_err());
    }

    #[test]
    fn features_round_trip() {
        let mut vocab = Vocab::new();
        for name in ["x", "y", "z"] {
            vocab.get_or_insert(name.to_string());
        }

        let features = ndarray::array![[1., 0.5], [-2., 0.], [0.25, 8.]];
        let path = temp_path("features.tsv.gz");
        let path = path.to_str().unwrap().to_string();
        {
            let mut writer = FeatureWriter::new(&path, &vocab, None).unwrap();
            writer.stream(features.view()).unwrap();
        }

        let loaded = FeatureReader::load(&path, &vocab, 2, 0).unwrap();
        assert_eq!(loaded, features);
    }

    #[test]
    fn features_fill_missing_nodes() {
        let mut vocab = Vocab::new();
        for name in ["x", "y", "z"] {
            vocab.get_or_insert(name.to_string());
        }

        let path = write_file("partial.tsv", "z\t[1,2]\nw\t[3,4]\n");
        let loaded = FeatureReader::load(&path, &vocab, 1, 0).unwrap();
        assert_eq!(loaded, ndarray::array![[0., 0.], [0., 0.], [1., 2.]]);

        let path = write_file("ragged.tsv", "x\t[1,2]\ny\t[3]\n");
        assert!(FeatureReader::load(&path, &vocab, 1, 0).is_err());
    }
}
