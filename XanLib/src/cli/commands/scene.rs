//! XBF scene CLI commands
//!
//! Commands for inspecting and rewriting single XBF files.

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{CUBE, DISK, LOOKING_GLASS, print_done, print_step};
use crate::formats::xbf::{inspect_scene, read_xbf, write_xbf};

/// Print a summary of an XBF file, as text or JSON.
pub fn info(path: &Path, json: bool) -> anyhow::Result<()> {
    let scene = read_xbf(path)?;
    let info = inspect_scene(&scene);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("XBF File Information: {}", path.display());
    println!("====================");
    println!("Version:        {}", info.version);
    println!("FX data:        {} bytes", info.aux_size);
    println!("Texture table:  {} bytes ({} names)", info.texture_table_size, info.textures.len());
    println!("Nodes:          {} ({} roots)", info.node_count, info.root_count);
    println!("Vertices:       {}", info.vertex_count);
    println!("Faces:          {}", info.face_count);
    println!("Vertex anims:   {}", info.vertex_animations);
    println!("Key anims:      {}", info.key_animations);
    if let Some(err) = &info.error {
        println!();
        println!("Decoding stopped early: {err}");
        if let Some(len) = info.unparsed_tail_len {
            println!("Unparsed tail:  {len} bytes");
        }
    }
    println!();

    println!("Nodes:");
    println!("------");
    for node in &info.nodes {
        let mut extras = Vec::new();
        if let Some(kind) = node.vertex_animation {
            extras.push(format!("vertex anim: {kind}"));
        }
        if let Some(kind) = node.key_animation {
            extras.push(format!("key anim: {kind}"));
        }
        let extras = if extras.is_empty() {
            String::new()
        } else {
            format!(" [{}]", extras.join(", "))
        };
        println!(
            "  {}{} ({} vertices, {} faces){}",
            "  ".repeat(node.depth),
            node.name,
            node.vertex_count,
            node.face_count,
            extras
        );
    }

    Ok(())
}

/// Print the node hierarchy.
pub fn tree(path: &Path) -> anyhow::Result<()> {
    let scene = read_xbf(path)?;
    print!("{}", scene.outline());
    if let Some(err) = &scene.error {
        eprintln!("(decoding stopped early: {err})");
    }
    Ok(())
}

/// List the texture names referenced by a scene.
pub fn textures(path: &Path) -> anyhow::Result<()> {
    let scene = read_xbf(path)?;
    for name in scene.texture_names() {
        println!("{name}");
    }
    Ok(())
}

/// Decode a file and write the scene back out.
pub fn resave(source: &Path, output: &Path) -> anyhow::Result<()> {
    let started = Instant::now();

    print_step(1, 2, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    let scene = read_xbf(source)?;
    if let Some(err) = &scene.error {
        println!("      {CUBE}Keeping unparsed bytes: {err}");
    }

    print_step(2, 2, DISK, &format!("Writing {}...", output.display()));
    write_xbf(&scene, output)?;

    print_done(started.elapsed());
    Ok(())
}
