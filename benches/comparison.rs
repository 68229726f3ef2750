use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gatk_bcf2::af::{
    heterozygosity_priors, AlleleFrequencyModel, BiallelicGenotypeLikelihoods, ExactModel,
    GridSearchModel, SampleLikelihoods,
};
use gatk_bcf2::record::{Allele, GenotypeBuilder};
use gatk_bcf2::{BcfRecords, BcfWriter, Header, HeaderRef, ReaderOptions, VariantRecord};

const N_SAMPLES: usize = 50;
const N_RECORDS: usize = 500;

fn header() -> HeaderRef {
    let samples = (0..N_SAMPLES).map(|i| format!("\tS{}", i)).collect::<String>();
    let text = format!(
        "##fileformat=VCFv4.1
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Phred-scaled likelihoods\">
##contig=<ID=chr1,length=248956422>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT{}
",
        samples
    );
    HeaderRef::new(Header::from_text(&text).unwrap())
}

fn records() -> Vec<VariantRecord> {
    (0..N_RECORDS)
        .map(|i| {
            let mut builder = VariantRecord::builder()
                .contig("chr1")
                .start(100 * i as u64 + 1)
                .allele_strings(&["A", "G"])
                .qual(30.0)
                .pass()
                .info("DP", (10 * N_SAMPLES as i32).into());
            for s in 0..N_SAMPLES {
                let alt = (s + i) % 3;
                let alleles = (0..2)
                    .map(|j| if j < alt { Allele::alternate("G") } else { Allele::reference("A") })
                    .collect();
                let mut pl = vec![40, 40, 40];
                pl[alt] = 0;
                builder = builder.genotype(
                    GenotypeBuilder::new(format!("S{}", s))
                        .alleles(alleles)
                        .gq(40)
                        .likelihoods(pl)
                        .make(),
                );
            }
            builder.build().unwrap()
        })
        .collect()
}

fn encoded(header: &HeaderRef, records: &[VariantRecord]) -> Vec<u8> {
    let mut writer = BcfWriter::new(Vec::new(), header.clone()).unwrap();
    for record in records {
        writer.write(record).unwrap();
    }
    writer.finish().unwrap()
}

fn benchmark_codec(c: &mut Criterion) {
    let header = header();
    let records = records();
    let bytes = encoded(&header, &records);

    let mut group = c.benchmark_group("CODEC");
    group.bench_function("ENCODE", |b| b.iter(|| encoded(&header, black_box(&records))));
    group.bench_function("DECODE_SITES", |b| {
        b.iter(|| {
            BcfRecords::new(black_box(bytes.as_slice()), ReaderOptions::default())
                .unwrap()
                .filter_map(|r| r.ok())
                .count()
        })
    });
    group.bench_function("DECODE_GENOTYPES", |b| {
        b.iter(|| {
            BcfRecords::new(black_box(bytes.as_slice()), ReaderOptions::default())
                .unwrap()
                .filter_map(|r| r.ok())
                .map(|mut r| r.genotypes().map(|g| g.len()).unwrap_or(0))
                .sum::<usize>()
        })
    });
    group.bench_function("SKIP_GENOTYPES", |b| {
        b.iter(|| {
            BcfRecords::new(black_box(bytes.as_slice()), ReaderOptions::sites_only())
                .unwrap()
                .count()
        })
    });
    group.finish();
}

fn likelihoods(n: usize) -> SampleLikelihoods {
    (0..n)
        .map(|i| {
            let gl = match i % 4 {
                0 => BiallelicGenotypeLikelihoods::new(-12.0, -4.0, 0.0),
                1 => BiallelicGenotypeLikelihoods::new(-5.0, 0.0, -6.0),
                _ => BiallelicGenotypeLikelihoods::new(0.0, -3.0, -9.0),
            };
            (format!("S{}", i), gl)
        })
        .collect()
}

fn benchmark_af(c: &mut Criterion) {
    let mut group = c.benchmark_group("AF");
    for n in [10, 100, 500] {
        let gls = likelihoods(n);
        let priors = heterozygosity_priors(2 * n, 1e-3);
        group.bench_with_input(BenchmarkId::new("EXACT", n), &gls, |b, gls| {
            let mut model = ExactModel::default();
            b.iter(|| model.log10_posteriors(black_box(gls), &priors).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("GRID_SEARCH", n), &gls, |b, gls| {
            let mut model = GridSearchModel::new();
            b.iter(|| model.log10_posteriors(black_box(gls), &priors).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_codec, benchmark_af);
criterion_main!(benches);
