//! Performance benchmarks for simonctr-crypto.
//!
//! Run with: `cargo bench -p simonctr-crypto`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use num_bigint::BigUint;
use rand::RngCore;
use rand_core::OsRng;
use simonctr_crypto::SessionKey;
use simonctr_crypto::cipher::{BlockCipher, CipherParams, KeySchedule};
use simonctr_crypto::ctr::{CounterStream, CtrNonce};
use simonctr_crypto::hash::sha3_512_int;
use simonctr_crypto::rsa::KeyPair;

fn random_biguint(bytes: usize) -> BigUint {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    BigUint::from_bytes_le(&buf)
}

// ============================================================================
// Block Cipher Benchmarks
// ============================================================================

fn bench_block_encrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("simon_encrypt");

    let variants = [(32u32, 64u32), (64, 128), (128, 256)];

    for (block, key) in variants {
        let params = CipherParams::new(block, key).unwrap();
        let cipher = BlockCipher::new(params, &random_biguint(key as usize / 8)).unwrap();
        let mask = if block == 128 { u128::MAX } else { (1u128 << block) - 1 };
        let pt = 0x0123_4567_89ab_cdef_fedc_ba98_7654_3210u128 & mask;

        group.throughput(Throughput::Bytes(u64::from(block / 8)));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{block}/{key}")),
            &pt,
            |b, &pt| b.iter(|| cipher.encrypt(black_box(pt))),
        );
    }

    group.finish();
}

fn bench_key_schedule(c: &mut Criterion) {
    let master = random_biguint(32);

    c.bench_function("simon_key_schedule_128_256", |b| {
        b.iter(|| KeySchedule::derive(&CipherParams::SIMON_128_256, black_box(&master)))
    });
}

// ============================================================================
// Counter Mode Benchmarks
// ============================================================================

fn bench_ctr_encrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctr_encrypt");

    let stream = CounterStream::new(&SessionKey::generate().unwrap()).unwrap();
    let nonce = CtrNonce::generate();

    // Handshake payloads are a few hundred bytes; larger sizes show scaling.
    let sizes = [64usize, 512, 4096, 16384];

    for size in sizes {
        let plaintext = random_biguint(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| stream.encrypt_with_nonce(black_box(nonce), black_box(&plaintext)))
        });
    }

    group.finish();
}

fn bench_ctr_decrypt(c: &mut Criterion) {
    let stream = CounterStream::new(&SessionKey::generate().unwrap()).unwrap();
    let (nonce, ciphertext) = stream.encrypt(&random_biguint(512)).unwrap();

    c.bench_function("ctr_decrypt_512", |b| {
        b.iter(|| stream.decrypt(black_box(nonce), black_box(&ciphertext)))
    });
}

// ============================================================================
// Hash and Modpow Benchmarks
// ============================================================================

fn bench_sha3_512(c: &mut Criterion) {
    let data = vec![0xAAu8; 1024];

    c.bench_function("sha3_512_int_1k", |b| b.iter(|| sha3_512_int(black_box(&data))));
}

fn bench_rsa_toy(c: &mut Criterion) {
    let pair = KeyPair::from_components(
        BigUint::from(17u32),
        BigUint::from(2753u32),
        BigUint::from(3233u32),
    )
    .unwrap();
    let digest = BigUint::from(1234u32);
    let signature = pair.private().sign(&digest).unwrap();

    c.bench_function("rsa_verify_toy", |b| {
        b.iter(|| pair.public().verify(black_box(&digest), black_box(&signature)))
    });
}

criterion_group!(
    benches,
    bench_block_encrypt,
    bench_key_schedule,
    bench_ctr_encrypt,
    bench_ctr_decrypt,
    bench_sha3_512,
    bench_rsa_toy,
);

criterion_main!(benches);
