use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn, LevelFilter};
use structopt::StructOpt;
use strum::EnumString;

use gatk_bcf2::af::{
    heterozygosity_priors, AlleleFrequencyModel, BiallelicGenotypeLikelihoods, ExactModel,
    GridSearchModel, SampleLikelihoods, DEFAULT_HETEROZYGOSITY,
};
use gatk_bcf2::reader::{BcfRecords, ReaderOptions};
use gatk_bcf2::record::VariantRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum CallModel {
    Exact,
    Grid,
}

impl CallModel {
    fn build(self) -> Box<dyn AlleleFrequencyModel> {
        match self {
            CallModel::Exact => Box::new(ExactModel::default()),
            CallModel::Grid => Box::new(GridSearchModel::new()),
        }
    }
}

#[derive(StructOpt)]
#[structopt(
    name = "bcf2-tool",
    about = "Summarize a BCF2 file and optionally call biallelic sites."
)]
struct Args {
    /// BCF2 file, optionally gzip compressed.
    #[structopt(parse(from_os_str))]
    path: PathBuf,

    /// Skip genotype blocks while reading.
    #[structopt(long, conflicts_with = "call")]
    sites_only: bool,

    /// Allele frequency model used to call each biallelic site (exact or grid).
    #[structopt(long, value_name = "MODEL")]
    call: Option<CallModel>,

    #[structopt(long, short, help = "Verbose output.")]
    verbose: bool,
}

/// PL-derived likelihoods of every sample at a biallelic site.
fn site_likelihoods(record: &mut VariantRecord) -> Result<Option<SampleLikelihoods>> {
    if record.alleles().len() != 2 {
        return Ok(None);
    }
    let likelihoods = record
        .genotypes()?
        .iter()
        .filter_map(|(sample, g)| {
            g.likelihoods()
                .as_deref()
                .and_then(BiallelicGenotypeLikelihoods::from_pls)
                .map(|gl| (sample.clone(), gl))
        })
        .collect::<SampleLikelihoods>();
    Ok(if likelihoods.is_empty() {
        None
    } else {
        Some(likelihoods)
    })
}

fn main() -> Result<()> {
    let args = Args::from_args();
    let mut model = args.call.map(CallModel::build);

    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    let options = ReaderOptions {
        skip_genotypes: args.sites_only,
    };
    let records = BcfRecords::from_path(&args.path, options)
        .with_context(|| format!("cannot open {}", args.path.display()))?;
    info!(
        "{} samples, {} contigs, {} dictionary entries",
        records.header().samples().len(),
        records.header().contigs().len(),
        records.header().dictionary().len()
    );

    let mut per_contig: BTreeMap<String, usize> = BTreeMap::new();
    let mut failed = 0;
    for record in records {
        let mut record = match record {
            Ok(record) => record,
            Err(e) if e.is_format_error() => {
                warn!("skipping record: {}", e);
                failed += 1;
                continue;
            }
            Err(e) => return Err(e).context(format!("reading {}", args.path.display())),
        };
        *per_contig.entry(record.chrom().to_owned()).or_default() += 1;

        if let Some(model) = model.as_mut() {
            let locus = format!("{}:{}", record.chrom(), record.pos());
            let likelihoods = match site_likelihoods(&mut record)
                .with_context(|| format!("decoding genotypes at {}", locus))?
            {
                Some(likelihoods) => likelihoods,
                None => continue,
            };
            let priors = heterozygosity_priors(2 * likelihoods.len(), DEFAULT_HETEROZYGOSITY);
            let posteriors = model.log10_posteriors(&likelihoods, &priors)?;
            let calls = model.assign_genotypes(&likelihoods, &posteriors, record.alleles())?;
            let called = calls
                .values()
                .map(|g| format!("{}={}", g.sample(), g.alleles().iter().map(|a| a.as_str()).join("/")))
                .join(",");
            println!(
                "{}\tAC={}\tQUAL={:.2}\t{}",
                locus,
                posteriors.max_index(),
                -10.0 * posteriors.log10_p_ref(),
                called
            );
        }
    }

    for (contig, count) in &per_contig {
        info!("{}\t{}", contig, count);
    }
    info!(
        "{} records, {} skipped as malformed",
        per_contig.values().sum::<usize>(),
        failed
    );
    Ok(())
}
