use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use room_sync::document::DocumentSync;
use room_sync::presence::{CursorThrottle, Presence};
use room_sync::protocol::{
    ClientIntent, CursorPosition, CursorUpdate, DocumentUpdated, EditPayload, Participant,
    ParticipantId, PresenceChanged, RoomId, ServerEvent,
};

fn edit_frame(size: usize) -> String {
    ServerEvent::DocumentUpdated(DocumentUpdated {
        room_id: Some(RoomId::new("bench")),
        patch: "x".repeat(size),
        version: 42,
        origin: ParticipantId::new("peer"),
    })
    .encode()
    .unwrap()
}

fn bench_edit_decode(c: &mut Criterion) {
    let small = edit_frame(64);
    let large = edit_frame(50 * 1024);

    c.bench_function("edit_decode_64B", |b| {
        b.iter(|| black_box(ServerEvent::decode(black_box(&small)).unwrap()))
    });
    c.bench_function("edit_decode_50KiB", |b| {
        b.iter(|| black_box(ServerEvent::decode(black_box(&large)).unwrap()))
    });
}

fn bench_edit_encode(c: &mut Criterion) {
    let intent = ClientIntent::Edit(EditPayload {
        room_id: RoomId::new("bench"),
        patch: "y".repeat(4096),
        version: 7,
    });

    c.bench_function("edit_encode_4KiB", |b| {
        b.iter(|| black_box(intent.encode().unwrap()))
    });
}

fn bench_apply_update(c: &mut Criterion) {
    let me = ParticipantId::new("me");
    let update = DocumentUpdated {
        room_id: None,
        patch: "z".repeat(4096),
        version: 1,
        origin: ParticipantId::new("peer"),
    };

    c.bench_function("document_apply_update_4KiB", |b| {
        let mut doc = DocumentSync::new();
        b.iter(|| black_box(doc.apply_update(black_box(&update), Some(&me))))
    });
}

fn bench_presence(c: &mut Criterion) {
    let roster: Vec<Participant> = (0..100)
        .map(|i| Participant::new(format!("user-{i}"), format!("sock-{i}")))
        .collect();
    let frame = ServerEvent::Presence(PresenceChanged {
        participants: roster.clone(),
    })
    .encode()
    .unwrap();

    c.bench_function("presence_decode_100", |b| {
        b.iter(|| black_box(ServerEvent::decode(black_box(&frame)).unwrap()))
    });

    c.bench_function("cursor_apply_100_peers", |b| {
        let mut presence = Presence::new();
        presence.replace_roster(roster.clone());
        let me = ParticipantId::new("me");
        let updates: Vec<CursorUpdate> = roster
            .iter()
            .map(|p| CursorUpdate {
                origin: p.user_id.clone(),
                cursor: CursorPosition::new(1, 1),
            })
            .collect();
        b.iter(|| {
            for update in &updates {
                black_box(presence.apply_cursor(update, Some(&me)));
            }
        })
    });
}

fn bench_throttle(c: &mut Criterion) {
    c.bench_function("cursor_throttle_admit", |b| {
        let mut throttle = CursorThrottle::new(Duration::from_millis(75));
        let now = Instant::now();
        b.iter(|| black_box(throttle.admit_at(black_box(now))))
    });
}

criterion_group!(
    benches,
    bench_edit_decode,
    bench_edit_encode,
    bench_apply_update,
    bench_presence,
    bench_throttle,
);
criterion_main!(benches);
