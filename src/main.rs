pub mod align;
pub mod availability;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod expansion;
pub mod filtration;
pub mod llm;
pub mod model;
pub mod pathway;
pub mod persist;
pub mod resolver;
pub mod sources;
pub mod store;
pub mod tree;

use align::{align_root_node, structural_align, synonym_align};
use availability::AvailabilityOracle;
use clap::Parser;
use cli::{Cli, RetrievalMode};
use config::Config;
use error::{RetroSynError, Result};
use expansion::{DocumentSource, ExpansionController, ReactionExtractor};
use llm::{CachedLlm, LlmClient, OpenAiCompatibleClient};
use log::{error, info, warn};
use model::Reaction;
use persist::PathLayout;
use resolver::NameResolver;
use serde::Serialize;
use sources::compound_registry::PubChemRegistry;
use sources::name_resolvers::{PubChemNameResolver, SecondaryNameResolver};
use sources::paper::PaperDocumentSource;
use sources::patent::PatentDocumentSource;
use sources::pdf::PassthroughRenderer;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Instant;
use store::ReactionStore;
use tree::Tree;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .expect("Failed to initialize logger");

    let cli = Cli::parse();
    let start_time = Instant::now();

    match run(cli.clone()).await {
        Ok(output) => {
            info!("pipeline finished in {:.2?}", start_time.elapsed());
            if let Err(e) = write_output(&cli.output, &output) {
                error!("failed to write output: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("pipeline failed: {}", e);
            if let Err(write_err) = write_error(&cli, &e) {
                error!("failed to write error output: {}", write_err);
            }
            std::process::exit(1);
        }
    }
}

/// Floor-divides `n` between the patent and paper legs of `both-both`
/// retrieval, with the remainder going to papers (Open Question Decision
/// 1): both initial retrieval and expansion reuse this helper.
fn split_both_both(n: u32) -> (u32, u32) {
    let patents = n / 2;
    let papers = n - patents;
    (patents, papers)
}

enum CombinedSource<'a> {
    Paper(PaperDocumentSource<'a>),
    Patent(PatentDocumentSource<'a>),
    Both(PaperDocumentSource<'a>, PatentDocumentSource<'a>),
}

#[async_trait::async_trait]
impl<'a> DocumentSource for CombinedSource<'a> {
    async fn fetch(&self, substance: &str, num_results: u32) -> Result<Vec<String>> {
        match self {
            CombinedSource::Paper(p) => p.fetch(substance, num_results).await,
            CombinedSource::Patent(p) => p.fetch(substance, num_results).await,
            CombinedSource::Both(paper, patent) => {
                let (patent_n, paper_n) = split_both_both(num_results);
                let mut texts = Vec::new();
                if paper_n > 0 {
                    match paper.fetch(substance, paper_n).await {
                        Ok(t) => texts.extend(t),
                        Err(e) => warn!("paper leg of both-both retrieval failed for '{}': {}", substance, e),
                    }
                }
                if patent_n > 0 {
                    match patent.fetch(substance, patent_n).await {
                        Ok(t) => texts.extend(t),
                        Err(e) => warn!("patent leg of both-both retrieval failed for '{}': {}", substance, e),
                    }
                }
                Ok(texts)
            }
        }
    }
}

/// Extracts line-structured reaction text from a raw document via the
/// LLM, memoizing by a hash of the document text so a re-run never
/// re-issues the extraction prompt for a document it has already seen
/// (`res_pi/llm_res.json`, spec §6 persisted state layout).
struct LlmReactionExtractor<'a> {
    llm: &'a dyn LlmClient,
    cache: tokio::sync::Mutex<cache::JsonCache<String>>,
}

impl<'a> LlmReactionExtractor<'a> {
    fn new(llm: &'a dyn LlmClient, cache_path: PathBuf) -> Result<Self> {
        Ok(Self {
            llm,
            cache: tokio::sync::Mutex::new(cache::JsonCache::load(cache_path)?),
        })
    }
}

fn document_key(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("doc-{:x}", hasher.finish())
}

fn extraction_prompt(document_text: &str) -> String {
    format!(
        "Extract every chemical reaction described in the following document into \
         blocks of this exact form, separated by a blank line:\n\n\
         Reaction idx: <id>\nReactants: name1, name2, ...\nProducts: name1, name2, ...\n\
         Conditions: <free text>\nSource: <document id>\n\n\
         If no reaction is described, return nothing.\n\nDocument:\n{document_text}"
    )
}

#[async_trait::async_trait]
impl<'a> ReactionExtractor for LlmReactionExtractor<'a> {
    async fn extract(&self, document_text: &str) -> Result<String> {
        let key = document_key(document_text);
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&key) {
                info!("replaying cached extraction for document '{}'", key);
                return Ok(cached.clone());
            }
        }
        let extracted = self.llm.complete(&extraction_prompt(document_text)).await?;
        let mut cache = self.cache.lock().await;
        cache.insert(key, extracted.clone())?;
        Ok(extracted)
    }
}

fn synonym_prompt(names: &[String]) -> String {
    format!(
        "Here is a list of chemical substance names. Group any names that refer \
         to the same substance and report each group as:\n\
         Different names for the same substance: name1, name2, ...\n\
         Standardized name: <canonical name>\n\n\
         Names:\n{}",
        names.join(", ")
    )
}

fn root_alignment_prompt(material: &str, reactions_text: &str) -> String {
    format!(
        "The target substance of this synthesis record is '{material}'. Rewrite every \
         name in the text below that refers to the target substance so it reads exactly \
         '{material}', leaving every other name unchanged. Return the rewritten text only.\n\n\
         {reactions_text}"
    )
}

fn filter_reactions_prompt(reactions_text: &str) -> String {
    format!(
        "Review the following reactions for chemical plausibility. Reply with a section \
         headed 'Remaining Reactions:' listing only the 'Reaction idx: <id>' lines that \
         should be kept.\n\n{reactions_text}"
    )
}

fn filter_pathways_prompt(pathways_text: &str) -> String {
    format!(
        "Review the following synthesis pathways. Reply with a section headed \
         'Remaining Reaction Pathways:' listing only the 'Pathway: <ids>' lines that \
         should be kept.\n\n{pathways_text}"
    )
}

fn recommend_prompt(pathways_text: &str) -> String {
    format!(
        "Given the following candidate synthesis pathways, recommend exactly one. Reply as:\n\
         Recommended Reaction Pathway: <comma separated reaction ids>\nReasons: <free text>\n\n\
         {pathways_text}"
    )
}

#[derive(Debug, Serialize)]
struct Recommendation {
    pathway: Option<Vec<String>>,
    reasons: Option<String>,
}

fn parse_recommendation(response: &str) -> Recommendation {
    let mut pathway = None;
    let mut reasons = None;
    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Recommended Reaction Pathway:") {
            pathway = Some(
                rest.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        } else if let Some(rest) = line.strip_prefix("Reasons:") {
            reasons = Some(rest.trim().to_string());
        }
    }
    Recommendation { pathway, reasons }
}

#[derive(Debug, Serialize)]
struct ExpansionSummary {
    iterations_used: u32,
    reached_fixed_point: bool,
}

#[derive(Debug, Serialize)]
struct PipelineOutput {
    material: String,
    node_count_pre_expansion: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_count_post_expansion: Option<usize>,
    pathway_count: usize,
    pathways: Vec<Vec<String>>,
    unexpandable: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reactions: Option<Vec<Reaction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expansion: Option<ExpansionSummary>,
}

async fn run(cli: Cli) -> Result<PipelineOutput> {
    let config = Config::from_env();
    let layout = PathLayout::new(".");
    layout.ensure_dirs()?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.download_read_timeout)
        .pool_max_idle_per_host(config.max_concurrent_downloads)
        .build()?;

    let registry = PubChemRegistry::new(client.clone(), config.registry_base_url.clone());
    let primary_resolver = PubChemNameResolver::new(client.clone(), config.registry_base_url.clone());
    let fallback_resolver = SecondaryNameResolver::new(client.clone(), config.name_resolver_fallback_url.clone());
    let renderer = PassthroughRenderer;

    let mut ao = AvailabilityOracle::new(PathBuf::from("substance_query_result.json"), &registry)?;
    let mut nr = NameResolver::new(PathBuf::from("smiles_cache.json"), &primary_resolver, &fallback_resolver)?;

    let llm_api_key = config
        .llm_api_key
        .clone()
        .ok_or_else(|| RetroSynError::MissingEnvVar("API_KEY".to_string()))?;
    let llm_base_url = config
        .llm_base_url
        .clone()
        .ok_or_else(|| RetroSynError::MissingEnvVar("BASE_URL".to_string()))?;
    let llm_client = OpenAiCompatibleClient::new(
        client.clone(),
        llm_base_url,
        llm_api_key,
        config.llm_model.clone(),
        config.llm_temperature,
    );

    let paper_source = PaperDocumentSource::new(
        client.clone(),
        config.paper_search_base_url.clone().unwrap_or_default(),
        &renderer,
    )
    .with_search_timeout(config.paper_search_timeout);
    let patent_source = PatentDocumentSource::new(
        client.clone(),
        config.patent_db_base_url.clone().unwrap_or_default(),
        &renderer,
    );
    let source = match cli.retrieval_mode {
        RetrievalMode::PaperPaper => CombinedSource::Paper(paper_source),
        RetrievalMode::PatentPatent => CombinedSource::Patent(patent_source),
        RetrievalMode::BothBoth => CombinedSource::Both(paper_source, patent_source),
    };

    let extractor = LlmReactionExtractor::new(&llm_client, layout.extraction_results("llm_res"))?;

    info!(
        "acquiring initial documents for '{}' via {}",
        cli.material,
        cli.retrieval_mode.as_str()
    );
    let raw_documents = source.fetch(&cli.material, cli.num_results).await?;
    if raw_documents.is_empty() {
        return Err(RetroSynError::EmptyCorpus {
            material: cli.material.clone(),
        });
    }

    let alignment = cli.alignment.as_bool();
    let mut root_cache = CachedLlm::new(&llm_client, layout.aligned_root_results("llm_res"))?;

    let mut all_reactions = Vec::new();
    for (i, document_text) in raw_documents.iter().enumerate() {
        let doc_id = document_key(document_text);
        let extracted = match extractor.extract(document_text).await {
            Ok(text) => text,
            Err(e) => {
                warn!("extraction failed for document '{}': {}", doc_id, e);
                continue;
            }
        };

        let text_for_parsing = if alignment {
            match align_root_node(&mut root_cache, &doc_id, &cli.material, &extracted, root_alignment_prompt).await {
                Ok(rewritten) => rewritten,
                Err(e) => {
                    warn!("root alignment failed for document '{}': {}", doc_id, e);
                    extracted
                }
            }
        } else {
            extracted
        };

        all_reactions.extend(ReactionStore::parse_text(&text_for_parsing, &doc_id));

        if (i + 1) % config.extraction_batch_size == 0 {
            info!("extracted {}/{} initial documents", i + 1, raw_documents.len());
        }
    }

    if alignment {
        structural_align(&mut all_reactions, &mut nr).await;
        let mut synonym_cache = CachedLlm::new(&llm_client, PathBuf::from("synonym_hashmap_1.json"))?;
        synonym_align(&mut all_reactions, &mut synonym_cache, "initial", synonym_prompt).await?;
    }

    let mut store = ReactionStore::new();
    store.add_reactions(all_reactions);

    let pre_tree = Tree::build(&cli.material, &store, &mut ao, &mut nr).await;
    let pre_node_count = pre_tree.node_count();
    persist::save_tree(&pre_tree, &layout.tree_snapshot(&cli.material, false, alignment))?;

    let expansion = cli.expansion.as_bool();
    let (final_tree, expansion_summary) = if expansion {
        let mut ec = ExpansionController::new(config.max_expansion_iterations, &source, &extractor);
        let outcome = ec.run(&cli.material, &mut store, &mut ao, &mut nr).await;

        if alignment {
            let mut all: Vec<Reaction> = store.iterate().cloned().collect();
            structural_align(&mut all, &mut nr).await;
            let mut synonym_cache = CachedLlm::new(&llm_client, PathBuf::from("synonym_hashmap_2.json"))?;
            synonym_align(&mut all, &mut synonym_cache, "post-expansion", synonym_prompt).await?;
            store = ReactionStore::new();
            store.add_reactions(all);
        }

        (
            outcome.tree,
            Some(ExpansionSummary {
                iterations_used: outcome.iterations_used,
                reached_fixed_point: outcome.reached_fixed_point,
            }),
        )
    } else {
        (pre_tree, None)
    };

    persist::save_tree(
        &final_tree,
        &layout.tree_snapshot(&cli.material, expansion, alignment),
    )?;

    let post_node_count = final_tree.node_count();
    let mut pathways = pathway::enumerate_pathways(&final_tree);
    let mut final_store = store;

    if cli.filtration.as_bool() {
        let mut filter_cache = CachedLlm::new(&llm_client, PathBuf::from("naming_alg_llm_res.json"))?;
        final_store = filtration::filter_reactions(
            &final_tree,
            &final_store,
            &mut filter_cache,
            "filter_reactions",
            filter_reactions_prompt,
        )
        .await?;
        pathways = filtration::filter_pathways(
            pathways,
            &final_store,
            &mut filter_cache,
            "filter_pathways",
            filter_pathways_prompt,
        )
        .await?;
    }

    let recommendation = if pathways.is_empty() {
        None
    } else {
        let rendered = filtration::render_pathways_with_reactions(&pathways, &final_store);
        let mut recommend_cache = CachedLlm::new(&llm_client, PathBuf::from("naming_alg_llm_res.json"))?;
        match recommend_cache.complete("recommendation", &recommend_prompt(&rendered)).await {
            Ok(response) => Some(parse_recommendation(&response)),
            Err(e) => {
                warn!("recommendation prompt failed: {}", e);
                None
            }
        }
    };

    let reactions = if pathways.is_empty() {
        Some(final_store.iterate().cloned().collect())
    } else {
        None
    };

    let mut unexpandable: Vec<String> = final_tree.unexpandable.into_iter().collect();
    unexpandable.sort();

    Ok(PipelineOutput {
        material: cli.material.clone(),
        node_count_pre_expansion: pre_node_count,
        node_count_post_expansion: expansion_summary.as_ref().map(|_| post_node_count),
        pathway_count: pathways.len(),
        pathways,
        unexpandable,
        reactions,
        recommendation,
        expansion: expansion_summary,
    })
}

fn write_output(output_path: &Option<PathBuf>, output: &PipelineOutput) -> Result<()> {
    let serialized = serde_json::to_string_pretty(output).map_err(RetroSynError::TreeSerializationError)?;
    match output_path {
        Some(path) => cache::atomic_write_json(path, output),
        None => {
            println!("{serialized}");
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    material: String,
    num_results: u32,
    alignment: bool,
    expansion: bool,
    filtration: bool,
    retrieval_mode: String,
}

fn write_error(cli: &Cli, err: &RetroSynError) -> Result<()> {
    let payload = ErrorOutput {
        error: err.to_string(),
        material: cli.material.clone(),
        num_results: cli.num_results,
        alignment: cli.alignment.as_bool(),
        expansion: cli.expansion.as_bool(),
        filtration: cli.filtration.as_bool(),
        retrieval_mode: cli.retrieval_mode.as_str().to_string(),
    };
    match &cli.output {
        Some(path) => cache::atomic_write_json(path, &payload),
        None => {
            eprintln!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
            Ok(())
        }
    }
}
