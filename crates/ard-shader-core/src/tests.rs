use crate::{io, prelude::*};

#[test]
fn stage_markers() {
    assert_eq!(ShaderStage::from_marker("vert"), Some(ShaderStage::Vertex));
    assert_eq!(ShaderStage::from_marker(" Fragment "), Some(ShaderStage::Fragment));
    assert_eq!(ShaderStage::from_marker("comp"), Some(ShaderStage::Compute));
    assert_eq!(ShaderStage::from_marker("mesh"), None);
    assert_eq!(ShaderStage::from_extension("geom"), Some(ShaderStage::Geometry));
    assert_eq!(ShaderStage::from_extension("glsl"), None);
}

#[test]
fn stage_flags_iteration() {
    let flags = StageFlags::FRAGMENT | StageFlags::VERTEX;
    let stages: Vec<_> = flags.stages().collect();
    assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    assert!(flags.has_stage(ShaderStage::Vertex));
    assert!(!flags.has_stage(ShaderStage::Compute));

    let collected: StageFlags = [ShaderStage::Compute, ShaderStage::Vertex].into_iter().collect();
    assert_eq!(collected, StageFlags::COMPUTE | StageFlags::VERTEX);
}

#[test]
fn content_hash_is_sensitive() {
    let a = ContentHash::of("void main() { gl_Position = vec4(0.0); }");
    let b = ContentHash::of("void main() { gl_Position = vec4(1.0); }");
    assert_ne!(a, b);
    assert_eq!(a, ContentHash::of("void main() { gl_Position = vec4(0.0); }"));
}

#[test]
fn content_hash_text_form() {
    let hash = ContentHash::from_raw(0xdead_beef);
    assert_eq!(hash.to_string(), "00000000deadbeef");
    assert_eq!("00000000deadbeef".parse::<ContentHash>().unwrap(), hash);
    assert!("not a hash".parse::<ContentHash>().is_err());

    let text = ron::to_string(&hash).unwrap();
    assert_eq!(text, "\"00000000deadbeef\"");
    assert_eq!(ron::from_str::<ContentHash>(&text).unwrap(), hash);
}

#[test]
fn word_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested/out.spv");

    io::write_words_atomic(&path, &[0x0723_0203, 1, 2, 3]).unwrap();
    assert_eq!(io::read_words(&path).unwrap(), vec![0x0723_0203, 1, 2, 3]);
    assert!(!dir.path().join("nested/out.spv.tmp").exists());

    std::fs::write(&path, [1u8, 2, 3]).unwrap();
    assert!(io::read_words(&path).is_err());
}

#[test]
fn text_files_are_replaced_whole() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("registry.ron");

    io::write_text_atomic(&path, "a much longer first version").unwrap();
    io::write_text_atomic(&path, "short").unwrap();
    assert_eq!(io::read_text(&path).unwrap(), "short");
}
