//! The somatic mutation catalog knowledge base.
//!
//! Registers the catalog derivation pipeline on a [`DerivationGraph`]:
//!
//! | table | key → fields | multiplicity |
//! |---|---|---|
//! | `sample_mutations` | Sample → Genomic Mutation, Mutation zygosity | double |
//! | `sample_pmids` | Sample → Pubmed_PMID | flat |
//! | `mutation_index` | Mutation ID → Genomic Mutation | single |
//! | `mutation_genes` | Genomic Mutation → Ensembl Gene ID | flat |
//! | `mutation_isoforms` | Genomic Mutation → Mutated Isoform | flat |
//! | `mutation_protein_changes` | Genomic Mutation → Ensembl Protein ID, Change | double |
//! | `gene_principal_isoform_mutations` | Ensembl Gene ID → Mutated Isoform | flat |
//! | `gene_damage_analysis` | Ensembl Gene ID → Avg. damage score, Bg. Avg. damage score, T-test p-value | single |
//!
//! `gene_damage_analysis` is only registered when a damage score source is
//! configured.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use log::{debug, info};
use rayon::prelude::*;

use mutkb_core::consts::{
    CHANGE_FIELD, GENE_ID_FIELD, GENOMIC_MUTATION_FIELD, MUTATED_ISOFORM_FIELD, MUTATION_ID_COLUMN,
    PROTEIN_ID_FIELD,
    PUBMED_FIELD, SAMPLE_FIELD, SEGMENT_SEPARATOR, ZYGOSITY_FIELD,
};
use mutkb_core::utils::split_multi;
use mutkb_core::{
    Chromosome, DerivedTable, GenomicMutationId, GenomicPosition, MutatedIsoform, RawRow, SourceError,
    SourceTableProvider, TableSchema, encode_rows,
};
use mutkb_join::{flatten, flatten_field, group_by_prefix};
use mutkb_lift::{lift, lift_table};

use crate::config::KbConfig;
use crate::consts::{
    AVG_DAMAGE_FIELD, BG_AVG_DAMAGE_FIELD, ENSEMBL_PROTEIN_PREFIX, GENE_DAMAGE_ANALYSIS,
    GENE_PRINCIPAL_ISOFORM_MUTATIONS, MIN_DAMAGE_OBSERVATIONS, MISSING_DAMAGE_SCORE,
    MUTATION_GENES, MUTATION_INDEX, MUTATION_ISOFORMS, MUTATION_PROTEIN_CHANGES, P_VALUE_FIELD, SAMPLE_MUTATIONS,
    SAMPLE_PMIDS,
};
use crate::errors::{KbError, Result};
use crate::graph::DerivationGraph;
use crate::services::{CatalogServices, DamageScoreSource, StatisticalTest};
use crate::store::TableStore;

/// Declared schema of each catalog table, or `None` for other names.
pub fn catalog_schema(name: &str) -> Option<TableSchema> {
    let schema = match name {
        SAMPLE_MUTATIONS => TableSchema::double(SAMPLE_FIELD, &[GENOMIC_MUTATION_FIELD, ZYGOSITY_FIELD]),
        SAMPLE_PMIDS => TableSchema::flat(SAMPLE_FIELD, PUBMED_FIELD),
        MUTATION_INDEX => TableSchema::single(MUTATION_ID_COLUMN, &[GENOMIC_MUTATION_FIELD]),
        MUTATION_GENES => TableSchema::flat(GENOMIC_MUTATION_FIELD, GENE_ID_FIELD),
        MUTATION_ISOFORMS => TableSchema::flat(GENOMIC_MUTATION_FIELD, MUTATED_ISOFORM_FIELD),
        MUTATION_PROTEIN_CHANGES => {
            TableSchema::double(GENOMIC_MUTATION_FIELD, &[PROTEIN_ID_FIELD, CHANGE_FIELD])
        }
        GENE_PRINCIPAL_ISOFORM_MUTATIONS => TableSchema::flat(GENE_ID_FIELD, MUTATED_ISOFORM_FIELD),
        GENE_DAMAGE_ANALYSIS => TableSchema::single(
            GENE_ID_FIELD,
            &[AVG_DAMAGE_FIELD, BG_AVG_DAMAGE_FIELD, P_VALUE_FIELD],
        ),
        _ => return None,
    };
    Some(schema)
}

fn new_table(name: &str) -> Result<DerivedTable> {
    let schema = catalog_schema(name).ok_or_else(|| KbError::UnknownTable(name.to_string()))?;
    Ok(DerivedTable::new(name, schema))
}

///
/// A catalog knowledge base for one organism and build.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use mutkb_core::RawRow;
/// use mutkb_kb::{CatalogKnowledgeBase, CatalogServices, KbConfig, TableBackedServices};
///
/// let rows = vec![
///     RawRow::new("TCGA-01", Some("7:140453136-140453136"), Some("c.1799T>A")).with_zygosity("het"),
///     RawRow::new("TCGA-01", Some(""), Some("c.35G>A")),
/// ];
/// let kb = CatalogKnowledgeBase::in_memory(
///     KbConfig::default(),
///     Arc::new(rows),
///     CatalogServices::from_tables(TableBackedServices::new()),
/// )
/// .unwrap();
///
/// assert_eq!(kb.children("sample_mutations", "TCGA-01").unwrap(), vec!["7:140453136:A"]);
/// ```
pub struct CatalogKnowledgeBase {
    config: KbConfig,
    graph: DerivationGraph,
}

impl CatalogKnowledgeBase {
    /// A knowledge base persisting its tables under [`KbConfig::store_dir`].
    pub fn new(
        config: KbConfig,
        source: Arc<dyn SourceTableProvider>,
        services: CatalogServices,
    ) -> Result<Self> {
        config.validate()?;
        let store = TableStore::new(config.store_dir())?;
        info!("Using table store {:?}", store.root());
        Self::with_graph(config, DerivationGraph::with_store(store), source, services)
    }

    /// A knowledge base that keeps every table in memory.
    pub fn in_memory(
        config: KbConfig,
        source: Arc<dyn SourceTableProvider>,
        services: CatalogServices,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_graph(config, DerivationGraph::new(), source, services)
    }

    fn with_graph(
        config: KbConfig,
        graph: DerivationGraph,
        source: Arc<dyn SourceTableProvider>,
        services: CatalogServices,
    ) -> Result<Self> {
        register_catalog(&graph, &config, source, services)?;
        Ok(CatalogKnowledgeBase { config, graph })
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// The underlying graph, for registering further derived tables.
    pub fn graph(&self) -> &DerivationGraph {
        &self.graph
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<DerivedTable>> {
        self.graph.get(name)
    }

    pub fn children(&self, name: &str, key: &str) -> Result<Vec<String>> {
        self.graph.children(name, key)
    }

    pub fn invalidate(&self, name: &str) -> Result<()> {
        self.graph.invalidate(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.graph.names()
    }

    /// Catalog mutation ids on `chromosome` between `start` and `end`.
    pub fn mutation_ids_in_range(&self, chromosome: &str, start: u64, end: u64) -> Result<Vec<String>> {
        mutation_ids_in_range(&self.graph, chromosome, start, end)
    }
}

///
/// Register the catalog tables on `graph`.
///
pub fn register_catalog(
    graph: &DerivationGraph,
    config: &KbConfig,
    source: Arc<dyn SourceTableProvider>,
    services: CatalogServices,
) -> Result<()> {
    let schema = |name: &str| new_table(name).map(|t| t.schema().clone());

    {
        let (source, config, services) = (source.clone(), config.clone(), services.clone());
        graph.register_fn(SAMPLE_MUTATIONS, schema(SAMPLE_MUTATIONS)?, move |_| {
            sample_mutations(source.as_ref(), &config, &services)
        })?;
    }
    {
        let source = source.clone();
        graph.register_fn(SAMPLE_PMIDS, schema(SAMPLE_PMIDS)?, move |_| {
            sample_pmids(source.as_ref())
        })?;
    }
    {
        let (source, config, services) = (source.clone(), config.clone(), services.clone());
        graph.register_fn(MUTATION_INDEX, schema(MUTATION_INDEX)?, move |_| {
            mutation_index(source.as_ref(), &config, &services)
        })?;
    }
    {
        let (config, services) = (config.clone(), services.clone());
        graph.register_fn(MUTATION_GENES, schema(MUTATION_GENES)?, move |g| {
            mutation_genes(g, &config, &services)
        })?;
    }
    {
        let (config, services) = (config.clone(), services.clone());
        graph.register_fn(MUTATION_ISOFORMS, schema(MUTATION_ISOFORMS)?, move |g| {
            mutation_isoforms(g, &config, &services)
        })?;
    }
    graph.register_fn(
        MUTATION_PROTEIN_CHANGES,
        schema(MUTATION_PROTEIN_CHANGES)?,
        mutation_protein_changes,
    )?;
    {
        let services = services.clone();
        graph.register_fn(
            GENE_PRINCIPAL_ISOFORM_MUTATIONS,
            schema(GENE_PRINCIPAL_ISOFORM_MUTATIONS)?,
            move |g| gene_principal_isoform_mutations(g, &services),
        )?;
    }
    if let Some(damage) = services.damage_scores.clone() {
        let statistics = services.statistics.clone();
        graph.register_fn(GENE_DAMAGE_ANALYSIS, schema(GENE_DAMAGE_ANALYSIS)?, move |g| {
            gene_damage_analysis(g, damage.as_ref(), statistics.as_ref())
        })?;
    }
    Ok(())
}

fn tally_skip(skipped: &mut BTreeMap<&'static str, usize>, reason: &'static str) {
    *skipped.entry(reason).or_default() += 1;
}

fn log_skips(name: &str, skipped: &BTreeMap<&'static str, usize>) {
    for (reason, count) in skipped {
        info!("'{}': skipped {} rows ({})", name, count, reason);
    }
}

/// Pull the next row, skipping malformed lines. Other source errors abort.
fn next_row(
    rows: &mut dyn Iterator<Item = std::result::Result<RawRow, SourceError>>,
    skipped: &mut BTreeMap<&'static str, usize>,
) -> Result<Option<RawRow>> {
    for row in rows {
        match row {
            Ok(row) => return Ok(Some(row)),
            Err(SourceError::MalformedLine { line, expected, found }) => {
                debug!("Skipping catalog line {}: {} fields, expected {}", line, found, expected);
                tally_skip(skipped, "malformed line");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

///
/// Stream the catalog, encode rows `batch_size` at a time in parallel and
/// hand each encoded row to `emit`. Unencodable rows are tallied by reason.
///
fn encode_catalog<F>(
    source: &dyn SourceTableProvider,
    config: &KbConfig,
    name: &str,
    mut emit: F,
) -> Result<()>
where
    F: FnMut(&RawRow, GenomicMutationId) -> Result<()>,
{
    let mut skipped = BTreeMap::new();
    let mut batch: Vec<RawRow> = Vec::with_capacity(config.batch_size.min(1 << 16));
    let mut total = 0usize;

    let mut encode = |batch: &[RawRow], skipped: &mut BTreeMap<&'static str, usize>| -> Result<()> {
        for (row, encoded) in batch.iter().zip(encode_rows(batch)) {
            match encoded {
                Ok(id) => emit(row, id)?,
                Err(e) => {
                    debug!("Skipping row of sample '{}': {}", row.sample, e);
                    tally_skip(skipped, e.reason());
                }
            }
        }
        Ok(())
    };

    let mut rows = source.rows()?;
    while let Some(row) = next_row(&mut rows, &mut skipped)? {
        batch.push(row);
        if batch.len() >= config.batch_size {
            encode(&batch, &mut skipped)?;
            total += batch.len();
            batch.clear();
            info!("'{}': encoded {} catalog rows", name, total);
        }
    }
    encode(&batch, &mut skipped)?;
    total += batch.len();
    log_skips(name, &skipped);
    info!("'{}': encoded {} catalog rows", name, total);
    Ok(())
}

/// Lift the mutation ids of `table` into the knowledge base build, when the
/// catalog was released on another one.
fn lift_to_build(
    table: DerivedTable,
    config: &KbConfig,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    if !config.needs_lift() {
        return Ok(table);
    }

    let liftover = services.liftover.as_ref().ok_or_else(|| {
        KbError::Config(format!(
            "catalog positions are {} but the knowledge base is {}, and no liftover service is configured",
            config.catalog_build, config.build
        ))
    })?;
    let ids: Vec<GenomicMutationId> = flatten_field(&table, GENOMIC_MUTATION_FIELD)?
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect();
    let mapping = lift(liftover.as_ref(), &ids, &config.catalog_build, &config.build)?;
    let name = table.name().to_string();
    Ok(lift_table(&table, GENOMIC_MUTATION_FIELD, &mapping, &name)?)
}

///
/// Stream the catalog, encode rows in parallel batches and lift the result
/// into the knowledge base build when needed.
///
pub fn sample_mutations(
    source: &dyn SourceTableProvider,
    config: &KbConfig,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    let mut table = new_table(SAMPLE_MUTATIONS)?;
    encode_catalog(source, config, SAMPLE_MUTATIONS, |row, id| {
        table.push_row(
            row.sample.clone(),
            vec![id.into_string(), row.zygosity.clone().unwrap_or_default()],
        )?;
        Ok(())
    })?;
    info!("'{}': {} samples", SAMPLE_MUTATIONS, table.len());
    lift_to_build(table, config, services)
}

///
/// Catalog mutation id of each row mapped to its genomic mutation. Rows
/// without a catalog id are left out; a repeated id keeps its last mutation.
///
pub fn mutation_index(
    source: &dyn SourceTableProvider,
    config: &KbConfig,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    let mut table = new_table(MUTATION_INDEX)?;
    encode_catalog(source, config, MUTATION_INDEX, |row, id| {
        if let Some(mutation_id) = row.mutation_id.as_deref().filter(|m| !m.is_empty()) {
            table.push_row(mutation_id, vec![id.into_string()])?;
        }
        Ok(())
    })?;
    lift_to_build(table, config, services)
}

///
/// Catalog mutation ids whose genomic mutation lies on `chromosome` between
/// `start` and `end`, both inclusive. Sorted by position, then id.
///
pub fn mutation_ids_in_range(
    graph: &DerivationGraph,
    chromosome: &str,
    start: u64,
    end: u64,
) -> Result<Vec<String>> {
    let chromosome = Chromosome::canonicalize(chromosome)?;
    let index = graph.get(MUTATION_INDEX)?;

    let mut hits: Vec<(u64, &String)> = index
        .iter()
        .filter_map(|(mutation_id, values)| {
            let id: GenomicMutationId = values[0].first()?.parse().ok()?;
            (id.chromosome() == chromosome.as_str() && (start..=end).contains(&id.offset()))
                .then_some((id.offset(), mutation_id))
        })
        .collect();
    hits.sort();
    Ok(hits.into_iter().map(|(_, id)| id.clone()).collect())
}

/// Publication ids per sample, deduplicated.
pub fn sample_pmids(source: &dyn SourceTableProvider) -> Result<DerivedTable> {
    let mut skipped = BTreeMap::new();
    let mut pmids: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    let mut rows = source.rows()?;
    while let Some(row) = next_row(&mut rows, &mut skipped)? {
        let Some(cell) = row.pubmed.as_deref() else {
            continue;
        };
        let values = split_multi(cell);
        if !values.is_empty() {
            pmids.entry(row.sample).or_default().extend(values);
        }
    }
    log_skips(SAMPLE_PMIDS, &skipped);

    let mut table = new_table(SAMPLE_PMIDS)?;
    for (sample, values) in pmids {
        table.extend(sample, values.into_iter().collect())?;
    }
    Ok(table)
}

/// Every distinct mutation in `sample_mutations`, parsed.
fn catalog_mutations(graph: &DerivationGraph) -> Result<Vec<GenomicMutationId>> {
    let samples = graph.get(SAMPLE_MUTATIONS)?;
    Ok(flatten(&samples)
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect())
}

/// Genes overlapping each mutation, one service call per batch of positions.
pub fn mutation_genes(
    graph: &DerivationGraph,
    config: &KbConfig,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    let mut at_position: BTreeMap<GenomicPosition, Vec<GenomicMutationId>> = BTreeMap::new();
    for id in catalog_mutations(graph)? {
        match id.position_key().parse::<GenomicPosition>() {
            Ok(position) => at_position.entry(position).or_default().push(id),
            Err(e) => debug!("No position for '{}': {}", id, e),
        }
    }

    let positions: Vec<GenomicPosition> = at_position.keys().cloned().collect();
    let mut table = new_table(MUTATION_GENES)?;
    for chunk in positions.chunks(config.batch_size) {
        let genes = services.identifiers.genes_for_positions(chunk)?;
        for (position, genes) in genes {
            if genes.is_empty() {
                continue;
            }
            for id in at_position.get(&position).into_iter().flatten() {
                table.extend(id.as_str(), genes.clone())?;
            }
        }
    }
    Ok(table)
}

/// Protein changes caused by each mutation.
pub fn mutation_isoforms(
    graph: &DerivationGraph,
    config: &KbConfig,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    let mutations = catalog_mutations(graph)?;
    let mut table = new_table(MUTATION_ISOFORMS)?;
    for chunk in mutations.chunks(config.batch_size) {
        for (mutation, isoforms) in services.isoforms.mutated_isoforms(chunk)? {
            if isoforms.is_empty() {
                continue;
            }
            table.extend(
                mutation.into_string(),
                isoforms.iter().map(|i| i.as_str().to_string()).collect(),
            )?;
        }
    }
    Ok(table)
}

/// `mutation_isoforms` split into protein and change, keeping only
/// changes at an amino acid position (`V600E`, `P72FrameShift`).
pub fn mutation_protein_changes(graph: &DerivationGraph) -> Result<DerivedTable> {
    let isoforms = graph.get(MUTATION_ISOFORMS)?;
    let mut table = new_table(MUTATION_PROTEIN_CHANGES)?;
    for (mutation, values) in isoforms.iter() {
        for isoform in &values[0] {
            let isoform = MutatedIsoform::from(isoform.as_str());
            if !isoform.is_protein_change() {
                continue;
            }
            table.push_row(
                mutation.clone(),
                vec![isoform.protein().to_string(), isoform.change().to_string()],
            )?;
        }
    }
    Ok(table)
}

///
/// Mutated isoforms grouped under their gene, keeping principal isoforms
/// only. The identifier service is asked once per distinct protein and once
/// per gene.
///
pub fn gene_principal_isoform_mutations(
    graph: &DerivationGraph,
    services: &CatalogServices,
) -> Result<DerivedTable> {
    let isoforms = graph.get(MUTATION_ISOFORMS)?;
    let by_protein = group_by_prefix(flatten(&isoforms), SEGMENT_SEPARATOR);

    let mut principal: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    let mut table = new_table(GENE_PRINCIPAL_ISOFORM_MUTATIONS)?;
    for (protein, isoforms) in by_protein {
        let Some(gene) = services.identifiers.gene_for_protein(&protein)? else {
            debug!("No gene for protein '{}'", protein);
            continue;
        };
        if !principal.contains_key(&gene) {
            let proteins = services.identifiers.principal_isoforms(&gene)?;
            principal.insert(gene.clone(), proteins.into_iter().collect());
        }
        if principal.get(&gene).is_some_and(|p| p.contains(&protein)) {
            table.extend(gene, isoforms)?;
        }
    }
    Ok(table)
}

/// Mean of the predictor scores that are not the missing marker.
fn mean_score(scores: &[f64]) -> Option<f64> {
    let good: Vec<f64> = scores
        .iter()
        .copied()
        .filter(|s| *s != MISSING_DAMAGE_SCORE)
        .collect();
    mean(&good)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted.len()
}

fn format_score(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn damage_row(
    isoforms: &[String],
    damage: &dyn DamageScoreSource,
    statistics: &dyn StatisticalTest,
) -> Result<Option<Vec<String>>> {
    let Some(first) = isoforms.first() else {
        return Ok(None);
    };
    let protein = MutatedIsoform::from(first.as_str()).protein().to_string();
    if !protein.starts_with(ENSEMBL_PROTEIN_PREFIX) {
        return Ok(None);
    }

    let scores = damage.damage_scores(&protein)?;
    let background: Vec<f64> = scores.values().filter_map(|s| mean_score(s)).collect();
    let sample: Vec<f64> = isoforms
        .iter()
        .filter_map(|i| scores.get(i))
        .filter_map(|s| mean_score(s))
        .collect();

    let p_value = if sample.len() < MIN_DAMAGE_OBSERVATIONS
        || distinct_count(&background) < MIN_DAMAGE_OBSERVATIONS
    {
        1.0
    } else {
        statistics.one_sided_p_value(&sample, &background)?
    };

    Ok(Some(vec![
        format_score(mean(&sample)),
        format_score(mean(&background)),
        p_value.to_string(),
    ]))
}

///
/// Compare the damage scores of each gene's mutated residues against all
/// scored residues of the same protein. Genes are processed in parallel.
///
pub fn gene_damage_analysis(
    graph: &DerivationGraph,
    damage: &dyn DamageScoreSource,
    statistics: &dyn StatisticalTest,
) -> Result<DerivedTable> {
    let genes = graph.get(GENE_PRINCIPAL_ISOFORM_MUTATIONS)?;
    let entries: Vec<(&String, &Vec<Vec<String>>)> = genes.iter().collect();

    let rows: Vec<(String, Option<Vec<String>>)> = entries
        .par_iter()
        .map(|(gene, values)| -> Result<(String, Option<Vec<String>>)> {
            Ok(((*gene).clone(), damage_row(&values[0], damage, statistics)?))
        })
        .collect::<Result<_>>()?;

    let mut table = new_table(GENE_DAMAGE_ANALYSIS)?;
    for (gene, row) in rows {
        if let Some(row) = row {
            table.push_row(gene, row)?;
        }
    }
    Ok(table)
}
