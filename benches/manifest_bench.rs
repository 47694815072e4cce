use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ffpcheck::fingerprint::Fingerprint;
use ffpcheck::manifest::Manifest;
use ffpcheck::source::read_streaminfo_md5;
use std::io::Cursor;

fn large_manifest(entries: usize) -> Manifest {
    let mut m = Manifest::new("/music/Box Set", "Box Set.ffp");
    for i in 0..entries {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
        m.insert(format!("CD{:02}/{:03} - Track.flac", i / 20 + 1, i % 20 + 1), Fingerprint::from_bytes(bytes));
    }
    m
}

fn bench_manifest(c: &mut Criterion) {
    let m = large_manifest(5_000);
    let text = m.to_text().unwrap();

    c.bench_function("manifest_write_5k", |b| b.iter(|| black_box(&m).to_text().unwrap()));
    c.bench_function("manifest_parse_5k", |b| {
        b.iter(|| Manifest::parse("/music/Box Set", "Box Set.ffp", black_box(&text)).unwrap())
    });

    let legacy: String = m
        .entries()
        .iter()
        .map(|(path, fp)| format!("{} *{}\r\n", fp.to_hex().to_uppercase(), path.replace('/', "\\")))
        .collect();
    c.bench_function("manifest_parse_legacy_5k", |b| {
        b.iter(|| Manifest::parse("/music/Box Set", "Box Set.ffp", black_box(&legacy)).unwrap())
    });
}

fn bench_streaminfo(c: &mut Criterion) {
    // fLaC + last-block STREAMINFO header + 34-byte body + some audio.
    let mut stream = b"fLaC".to_vec();
    stream.extend_from_slice(&[0x80, 0x00, 0x00, 34]);
    stream.extend_from_slice(&[0u8; 18]);
    stream.extend_from_slice(&[0xAB; 16]);
    stream.extend_from_slice(&vec![0u8; 64 * 1024]);

    c.bench_function("streaminfo_md5", |b| {
        b.iter(|| read_streaminfo_md5(Cursor::new(black_box(&stream))).unwrap())
    });
}

criterion_group!(benches, bench_manifest, bench_streaminfo);
criterion_main!(benches);
