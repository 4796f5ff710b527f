use anyhow::Result;
use serde::Serialize;

use ragpipe::config::RagConfig;
use ragpipe::embedding::{pairwise_similarities, EmbeddingStats, PairSimilarity};
use ragpipe::retrieval::DocumentStats;
use ragpipe::Pipeline;

use super::{print_json, process, DocumentArgs};

#[derive(Serialize)]
struct EmbedReport {
    document: DocumentStats,
    embeddings: EmbeddingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    similar_pairs: Option<Vec<PairSimilarity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<Vec<ProjectedPoint>>,
}

#[derive(Serialize)]
struct ProjectedPoint {
    chunk_id: String,
    coordinates: Vec<f32>,
}

/// Embed a document and print vector statistics.
pub async fn run(
    config: &RagConfig,
    doc: &DocumentArgs,
    similar_above: Option<f32>,
    project: Option<Option<usize>>,
    json: bool,
) -> Result<()> {
    let config = doc.apply(config);
    let project = project.map(|dims| config.visualization.dimensions_or(dims));
    let pipeline = Pipeline::from_config(config)?;
    let processed = process(&pipeline, doc).await?;
    let set = processed.session.embeddings();

    let similar_pairs = similar_above.map(|threshold| pairwise_similarities(set, threshold));
    let projection = match project {
        Some(dims) => {
            let coords = pipeline.reduce_dimensions(set, dims)?;
            Some(
                set.chunk_ids
                    .iter()
                    .cloned()
                    .zip(coords)
                    .map(|(chunk_id, coordinates)| ProjectedPoint {
                        chunk_id,
                        coordinates,
                    })
                    .collect::<Vec<_>>(),
            )
        }
        None => None,
    };

    let report = EmbedReport {
        document: processed.stats,
        embeddings: EmbeddingStats::of(set),
        similar_pairs,
        projection,
    };

    if json {
        return print_json(&report);
    }

    let stats = &report.embeddings;
    println!("Embedding Statistics");
    println!("{}", "=".repeat(40));
    println!("  Method:              {}", stats.method);
    println!("  Model:               {}", stats.model_id);
    println!("  Vectors:             {}", stats.vectors);
    println!("  Dimensions:          {}", stats.dimensions);
    println!("  Sparsity:            {:.3}", stats.sparsity);
    println!("  Mean magnitude:      {:.4}", stats.mean_magnitude);
    if stats.fallbacks > 0 {
        println!("  Fallback vectors:    {} (zero-filled)", stats.fallbacks);
    }
    if !stats.sample_terms.is_empty() {
        println!("  Sample terms:        {}", stats.sample_terms.join(", "));
    }

    if let Some(pairs) = &report.similar_pairs {
        println!();
        println!("Similar pairs ({}):", pairs.len());
        for pair in pairs {
            println!("  {:<24} {:<24} {:.4}", pair.first, pair.second, pair.similarity);
        }
    }

    if let Some(points) = &report.projection {
        println!();
        println!("Projection:");
        for point in points {
            let coords = point
                .coordinates
                .iter()
                .map(|c| format!("{c:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {:<24} ({coords})", point.chunk_id);
        }
    }

    Ok(())
}
