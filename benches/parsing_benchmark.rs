// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tinybms_gateway::codec::crc::{append_crc, crc16};
use tinybms_gateway::codec::parse_poll_response;
use tinybms_gateway::parser::decode_live_data;
use tinybms_gateway::registers::total_word_count;

fn full_catalogue_frame() -> Vec<u8> {
    let word_count = total_word_count();
    let mut frame = vec![0xAAu8, 0x09, (word_count * 2) as u8];
    for i in 0..word_count as u16 {
        frame.extend_from_slice(&i.to_le_bytes());
    }
    append_crc(&mut frame);
    frame
}

fn bench_crc16(c: &mut Criterion) {
    let data = vec![0xABu8; 128];
    c.bench_function("crc16_128_bytes", |b| {
        b.iter(|| crc16(black_box(&data)))
    });
}

fn bench_parse_poll_response(c: &mut Criterion) {
    let frame = full_catalogue_frame();
    c.bench_function("parse_poll_response", |b| {
        b.iter(|| parse_poll_response(black_box(&frame)).unwrap())
    });
}

fn bench_decode_live_data(c: &mut Criterion) {
    let frame = full_catalogue_frame();
    let words = parse_poll_response(&frame).unwrap();
    c.bench_function("decode_live_data", |b| {
        b.iter(|| decode_live_data(black_box(&words), 0).unwrap())
    });
}

criterion_group!(benches, bench_crc16, bench_parse_poll_response, bench_decode_live_data);
criterion_main!(benches);
