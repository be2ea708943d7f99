//! The genotype/frequency retention rule.

/// First allele call of a pipe-separated genotype string.
fn first_allele(genotype: &str) -> Option<&str> {
    genotype.split('|').next().filter(|allele| !allele.is_empty())
}

/// Decide whether an individual's record is retained for this variant.
///
/// The record is kept when the first allele call matches the orientation
/// implied by the population frequency: reference calls (`0`) at
/// frequencies of at least 0.5, alternate calls (`1`) below 0.5. Anything
/// else, including genotypes without an extractable first allele, is
/// discarded. The rule is fixed and not configurable.
pub fn classify(genotype: &str, allele_frequency: f64) -> bool {
    match first_allele(genotype) {
        Some("0") => allele_frequency >= 0.5,
        Some("1") => allele_frequency < 0.5,
        _ => false,
    }
}
