//! Shared fixtures for unit tests.

use crate::header::{Header, HeaderRef};

pub(crate) const HEADER: &str = "##fileformat=VCFv4.1
##FILTER=<ID=LowQual,Description=\"Low quality\">
##FILTER=<ID=q10,Description=\"Quality below 10\">
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=SOURCE,Number=.,Type=String,Description=\"Call sources\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allele depths\">
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Phred-scaled likelihoods\">
##FORMAT=<ID=FT,Number=1,Type=String,Description=\"Sample filter\">
##FORMAT=<ID=HQ,Number=2,Type=Integer,Description=\"Haplotype quality\">
##contig=<ID=chr1,length=248956422>
##contig=<ID=chr2,length=242193529>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA12878\tNA12891\tNA12892
";

pub(crate) fn header() -> HeaderRef {
    HeaderRef::new(Header::from_text(HEADER).unwrap())
}
