
use fixtures::*;

use cas::{
    CasError, CasProcessor, CasTable, ProcessorSettings, RelocatedTable, RelocationMode,
};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_unpack_then_pack_is_identity() {
    ensure_env_logger_initialized();
    let d = tempdir().unwrap();
    let sample = build_cas(&sample_canm());
    let path = write_file(d.path(), "hero.CAS", &sample.data);

    let processor = CasProcessor::new();
    let unpacked = processor.unpack(&path).unwrap();
    let packed = processor.pack(&unpacked.output).unwrap();

    assert_eq!(packed.container, path);
    assert_eq!(packed.repack.delta, 0);
    assert_eq!(fs::read(&path).unwrap(), sample.data);
}

#[test]
fn test_grown_resource_shifts_trailing_offsets() {
    let d = tempdir().unwrap();
    let sample = build_cas(&sample_canm());
    let path = write_file(d.path(), "hero.CAS", &sample.data);

    let bigger = build_canm(
        &["idle", "walk_forward", "attack_01", "attack_02_heavy"],
        &["root", "spine", "head", "hand_R", "hand_L"],
    );
    let replacement = write_file(d.path(), "hero.CANM", &bigger);

    let report = CasProcessor::new().pack(&replacement).unwrap();
    let old_len = sample.resource_end - RESOURCE_START;
    let delta = bigger.len() as i64 - old_len as i64;
    assert!(delta > 0);
    assert_eq!(report.repack.delta, delta);
    assert_eq!(report.repack.old_len, old_len);
    assert_eq!(report.repack.new_len, bigger.len());
    assert_eq!(
        report.repack.mode,
        RelocationMode::PastBoundary {
            boundary: sample.resource_end as u32
        }
    );

    let packed = fs::read(&path).unwrap();
    assert_eq!(packed.len() as i64, sample.data.len() as i64 + delta);
    assert_eq!(&packed[..RESOURCE_START], &rewritten_prefix(&sample, delta)[..]);
    assert_eq!(&packed[RESOURCE_START..RESOURCE_START + bigger.len()], &bigger[..]);
    assert_eq!(&packed[packed.len() - 4..], b"TAIL");

    for field in &sample.trailing_fields {
        let before = get_u32(&sample.data, field.position);
        let after = get_u32(&packed, field.position);
        assert_eq!(after as i64, before as i64 + delta, "{}", field.name);
        assert_eq!(get_name(&packed, after as usize), field.name);
    }

    let prelude = &sample.prelude_field;
    assert_eq!(
        get_u32(&packed, prelude.position),
        get_u32(&sample.data, prelude.position)
    );
    assert_eq!(
        get_name(&packed, get_u32(&packed, prelude.position) as usize),
        prelude.name
    );

    let total = report.repack.total();
    assert_eq!(total.shifted, sample.trailing_fields.len());
    assert_eq!(total.skipped, 1);
}

/// The container bytes before the resource with every trailing field moved by `delta`.
fn rewritten_prefix(sample: &SampleCas, delta: i64) -> Vec<u8> {
    let mut prefix = sample.data[..RESOURCE_START].to_vec();
    for field in &sample.trailing_fields {
        let v = get_u32(&prefix, field.position) as i64 + delta;
        put_u32(&mut prefix, field.position, v as u32);
    }
    prefix
}

#[test]
fn test_shrunk_resource_shifts_backwards() {
    let sample = build_cas(&sample_canm());
    let smaller = build_canm(&["idle"], &["root"]);

    let repacked = CasProcessor::new().repack(&sample.data, &smaller).unwrap();
    let delta = repacked.report.delta;
    assert!(delta < 0);
    assert_eq!(&repacked.data[..RESOURCE_START], &rewritten_prefix(&sample, delta)[..]);

    for field in &sample.trailing_fields {
        let after = get_u32(&repacked.data, field.position);
        assert_eq!(get_name(&repacked.data, after as usize), field.name);
    }
}

#[test]
fn test_relocate_all_also_moves_offsets_before_the_resource() {
    let sample = build_cas(&sample_canm());
    let bigger = build_canm(
        &["idle", "walk_forward", "attack_01", "extra"],
        &["root", "spine", "head", "hand_R"],
    );

    let processor =
        CasProcessor::new().with_configuration(ProcessorSettings::new().relocate_all(true));
    let repacked = processor.repack(&sample.data, &bigger).unwrap();
    let delta = repacked.report.delta;
    assert_eq!(repacked.report.mode, RelocationMode::Unconditional);

    let prelude = sample.prelude_field.position;
    assert_eq!(
        get_u32(&repacked.data, prelude) as i64,
        get_u32(&sample.data, prelude) as i64 + delta
    );
    assert_eq!(repacked.report.total().skipped, 0);
}

#[test]
fn test_relocation_follows_table_order() {
    let sample = build_cas(&sample_canm());
    let repacked = CasProcessor::new()
        .repack(&sample.data, &build_canm(&["a"], &[]))
        .unwrap();

    let order: Vec<RelocatedTable> = repacked.report.tables.iter().map(|t| t.table).collect();
    assert_eq!(
        order,
        vec![
            RelocatedTable::Header(CasTable::TControl),
            RelocatedTable::Header(CasTable::VControl),
            RelocatedTable::Header(CasTable::AnimationGroup),
            RelocatedTable::McAnimation { group: 0 },
            RelocatedTable::McAnimation { group: 1 },
            RelocatedTable::Header(CasTable::Bone),
        ]
    );
    let counts: Vec<usize> = repacked.report.tables.iter().map(|t| t.span.count).collect();
    assert_eq!(counts, vec![2, 1, 2, 2, 1, 3]);
}

#[test]
fn test_pack_refuses_replacement_without_magic() {
    let d = tempdir().unwrap();
    let sample = build_cas(&sample_canm());
    let path = write_file(d.path(), "hero.CAS", &sample.data);
    let mut broken = sample_canm();
    broken[0] = b'X';
    let replacement = write_file(d.path(), "hero.CANM", &broken);

    let err = CasProcessor::new().pack(&replacement).unwrap_err();
    assert!(matches!(err, CasError::InvalidEmbeddedMagic { offset: 0, .. }));
    assert_eq!(fs::read(&path).unwrap(), sample.data);
}

#[test]
fn test_pack_refuses_corrupted_container() {
    let good = build_cas(&sample_canm()).data;
    let replacement_data = build_canm(&["idle", "walk_forward", "extra"], &["root"]);

    let mut bad_magic = good.clone();
    bad_magic[1] = b'X';
    let mut bad_version = good.clone();
    put_u32(&mut bad_version, 4, 514);
    let mut bad_canm = good.clone();
    bad_canm[RESOURCE_START] = b'X';

    for (name, data) in [
        ("magic", bad_magic),
        ("version", bad_version),
        ("canm", bad_canm),
    ] {
        let d = tempdir().unwrap();
        let path = write_file(d.path(), &format!("{}.CAS", name), &data);
        let replacement = write_file(d.path(), &format!("{}.CANM", name), &replacement_data);

        let err = CasProcessor::new().pack(&replacement).unwrap_err();
        assert!(err.is_format_error(), "{}: unexpected error {:?}", name, err);
        assert_eq!(fs::read(&path).unwrap(), data, "{}: container changed", name);
        assert_eq!(
            fs::read(&replacement).unwrap(),
            replacement_data,
            "{}: replacement changed",
            name
        );
    }
}

#[test]
fn test_huge_animation_group_count_is_an_error() {
    let d = tempdir().unwrap();
    let mut data = build_cas(&sample_canm()).data;
    put_u32(&mut data, 0x1C, 0xFFFF_FFFF);
    let path = write_file(d.path(), "hero.CAS", &data);
    let replacement = write_file(d.path(), "hero.CANM", &sample_canm());

    let processor = CasProcessor::new();
    assert!(processor.inspect(&data).is_err());
    assert!(processor.repack(&data, &sample_canm()).is_err());
    assert!(processor.pack(&replacement).is_err());
    assert_eq!(fs::read(&path).unwrap(), data);
}

#[test]
fn test_pack_finds_container_with_lowercase_extension() {
    let d = tempdir().unwrap();
    let sample = build_cas(&sample_canm());
    let path = write_file(d.path(), "npc.cas", &sample.data);
    let replacement = write_file(d.path(), "npc.CANM", &sample_canm());

    let report = CasProcessor::new().pack(&replacement).unwrap();
    assert!(
        report
            .container
            .extension()
            .unwrap()
            .eq_ignore_ascii_case("cas")
    );
    assert_eq!(fs::read(&path).unwrap(), sample.data);
}

#[test]
fn test_pack_without_container() {
    let d = tempdir().unwrap();
    let replacement = write_file(d.path(), "lonely.CANM", &sample_canm());

    let err = CasProcessor::new().pack(&replacement).unwrap_err();
    match err {
        CasError::ContainerNotFound { path } => {
            assert_eq!(path, d.path().join("lonely.CAS"))
        }
        other => panic!("expected ContainerNotFound, got {:?}", other),
    }
}
