use polyevolve::data::codec::{
    compress, decode_gene, decode_genome, decode_genome_compressed, decompress, encode_gene, encode_genome,
    encode_genome_compressed, encoded_gene_len,
};
use polyevolve::data::RawGenome;
use polyevolve::engines::generation::{Gene, Genome};
use polyevolve::types::Argb;
use polyevolve::EngineError;
use std::sync::Arc;

fn example_gene() -> Gene {
    Gene::from_coords(&[0, 10, 5], &[0, 0, 10], Argb::new(255, 0, 0, 0)).unwrap()
}

fn example_genome() -> Genome {
    Genome::single_layer(vec![Arc::new(example_gene())])
        .unwrap()
        .with_fitness(0.0)
        .with_counters(0, 0)
}

#[test]
fn example_gene_is_18_bytes() {
    let bytes = encode_gene(&example_gene());
    assert_eq!(bytes.len(), 18);
    assert_eq!(encoded_gene_len(3), 18);
    // version, A, R, G, B, vertex count
    assert_eq!(&bytes[..6], &[1, 255, 0, 0, 0, 3]);
    // second vertex x = 10, big-endian i16
    assert_eq!(&bytes[10..12], &[0, 10]);
}

#[test]
fn example_genome_is_39_bytes() {
    let bytes = encode_genome(&example_genome());
    assert_eq!(bytes.len(), 1 + 8 + 4 + 4 + 4 + 18);
    assert_eq!(bytes[0], 1);
    assert_eq!(&bytes[17..21], &[0, 0, 0, 1]);
}

#[test]
fn gene_round_trip_at_boundaries() {
    let extremes = [
        Argb::new(0, 0, 0, 0),
        Argb::new(255, 255, 255, 255),
        Argb::new(0, 255, 0, 255),
    ];
    for color in extremes {
        let gene = Gene::from_coords(&[-32768, 32767, 0], &[32767, -32768, 0], color).unwrap();
        assert_eq!(decode_gene(&encode_gene(&gene)).unwrap(), gene);
    }

    let xs: Vec<i32> = (0..255).collect();
    let ys: Vec<i32> = (0..255).map(|i| (i * 7) % 100).collect();
    let big = Gene::from_coords(&xs, &ys, Argb::new(12, 34, 56, 78)).unwrap();
    let decoded = decode_gene(&encode_gene(&big)).unwrap();
    assert_eq!(decoded, big);
    assert_eq!(decoded.structural_hash(), big.structural_hash());
}

#[test]
fn genome_round_trip_keeps_header() {
    let genome = example_genome().with_fitness(1234.5).with_counters(7, 99);
    let decoded = decode_genome(&encode_genome(&genome)).unwrap();
    assert_eq!(decoded, genome);
    assert_eq!(decoded.improvements(), 7);
    assert_eq!(decoded.mutations(), 99);
    assert_eq!(decoded.fitness(), 1234.5);
}

#[test]
fn layered_genome_uses_version_two() {
    let second = Arc::new(Gene::from_coords(&[1, 2, 3, 4], &[4, 3, 9, 1], Argb::new(9, 8, 7, 6)).unwrap());
    let genome = example_genome()
        .with_new_layer(vec![Arc::clone(&second), second])
        .unwrap()
        .with_fitness(3.25);
    let bytes = encode_genome(&genome);
    assert_eq!(bytes[0], 2);
    let decoded = decode_genome(&bytes).unwrap();
    assert_eq!(decoded.layer_count(), 2);
    assert_eq!(decoded, genome);
}

#[test]
fn unsupported_versions_fail() {
    let mut gene = encode_gene(&example_gene());
    gene[0] = 9;
    assert!(matches!(
        decode_gene(&gene),
        Err(EngineError::UnsupportedVersion { version: 9, .. })
    ));

    let mut genome = encode_genome(&example_genome());
    genome[0] = 0;
    assert!(matches!(
        decode_genome(&genome),
        Err(EngineError::UnsupportedVersion { version: 0, .. })
    ));
}

#[test]
fn truncated_input_fails_at_every_length() {
    let bytes = encode_genome(&example_genome());
    for len in 0..bytes.len() {
        assert!(decode_genome(&bytes[..len]).is_err(), "prefix of {} bytes decoded", len);
    }
    let gene = encode_gene(&example_gene());
    assert!(matches!(decode_gene(&gene[..17]), Err(EngineError::Truncated { .. })));
}

#[test]
fn trailing_bytes_and_short_genes_are_rejected() {
    let mut gene = encode_gene(&example_gene());
    gene.push(0);
    assert!(decode_gene(&gene).is_err());

    let mut short = encode_gene(&example_gene());
    short[5] = 2;
    short.truncate(6 + 2 * 4);
    assert!(decode_gene(&short).is_err());
}

#[test]
fn compressed_container_round_trip() {
    let genome = example_genome().with_counters(3, 4);
    let packed = encode_genome_compressed(&genome).unwrap();
    assert_eq!(&packed[..4], &39u32.to_be_bytes());
    assert_eq!(decode_genome_compressed(&packed).unwrap(), genome);
}

#[test]
fn container_length_mismatch_is_rejected() {
    let mut packed = compress(b"hello polygons").unwrap();
    packed[3] = packed[3].wrapping_add(1);
    assert!(matches!(decompress(&packed), Err(EngineError::Decode(_))));
    assert!(decompress(&[0, 0]).is_err());
}

#[test]
fn raw_genome_counts_distinct_genes() {
    let a = Arc::new(example_gene());
    let b = Arc::new(Gene::from_coords(&[5, 6, 7], &[1, 9, 2], Argb::new(1, 2, 3, 4)).unwrap());
    let genome = Genome::single_layer(vec![Arc::clone(&a), b, Arc::new(example_gene())])
        .unwrap()
        .with_fitness(10.0);

    let bytes = encode_genome(&genome);
    let raw = RawGenome::decode(&bytes).unwrap();
    assert_eq!(raw.gene_count(), 3);
    assert_eq!(raw.distinct_gene_count(), 2);
    assert_eq!(raw.gene_hashes().next(), Some(a.structural_hash()));
    assert_eq!(raw.encode(), bytes);
    assert_eq!(raw, RawGenome::from_genome(&genome));
    assert_eq!(raw.to_genome().unwrap(), genome);
}

fn layered_header(layers: u32) -> Vec<u8> {
    let mut bytes = vec![2u8];
    bytes.extend_from_slice(&0f64.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(&layers.to_be_bytes());
    bytes
}

#[test]
fn oversized_layer_count_fails_without_allocating() {
    let hostile = layered_header(u32::MAX);
    assert!(matches!(decode_genome(&hostile), Err(EngineError::Truncated { .. })));
    assert!(matches!(RawGenome::decode(&hostile), Err(EngineError::Truncated { .. })));

    let packed = compress(&hostile).unwrap();
    assert!(decode_genome_compressed(&packed).is_err());
    assert!(RawGenome::decode_compressed(&packed).is_err());
}

#[test]
fn oversized_gene_count_fails_without_allocating() {
    let mut hostile = layered_header(1);
    hostile.extend_from_slice(&u32::MAX.to_be_bytes());
    hostile.extend_from_slice(&encode_gene(&example_gene()));
    assert!(matches!(decode_genome(&hostile), Err(EngineError::Truncated { .. })));
    assert!(matches!(RawGenome::decode(&hostile), Err(EngineError::Truncated { .. })));
}
