//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `addintree_core` linkage.
//! - Build a small demo tree, materialize it and print deterministic output.

use addintree_core::{
    core_version, init_logging, Attribute, ArenaTree, BackingNodeId, BoxError, CatalogLocalizer,
    ExtensionTree, FieldSpec, LogSettings, NodeOrigin, NodeTypeSchema, RuntimeAddin,
    StaticAddinResolver,
};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MenuItem {
    label: String,
    shortcuts: Vec<String>,
}

fn main() {
    if let Ok(log_dir) = std::env::var("ADDINTREE_LOG_DIR") {
        let settings = LogSettings::new(addintree_core::default_log_level(), log_dir);
        if let Err(err) = init_logging(&settings) {
            eprintln!("addintree logging disabled: {err}");
        }
    }

    println!("addintree_core version={}", core_version());
    if let Err(err) = run() {
        log::error!("event=smoke_run module=cli status=error error=\"{err}\"");
        eprintln!("addintree smoke run failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let schema = Arc::new(
        NodeTypeSchema::builder::<MenuItem>("MenuItem")
            .field(FieldSpec::text("label", |m: &mut MenuItem, v| m.label = v).localizable())
            .field(FieldSpec::text_list("shortcuts", |m: &mut MenuItem, v| m.shortcuts = v))
            .build()?,
    );

    let resolver = Arc::new(StaticAddinResolver::new());
    resolver.register(
        RuntimeAddin::new("demo.editor").with_localizer(Arc::new(
            CatalogLocalizer::new()
                .with_entry("menu.open", "Open...")
                .with_entry("menu.save", "Save"),
        )),
        false,
    );

    let mut tree = ExtensionTree::new(ArenaTree::new(), resolver);
    let root = tree.backing().root();
    let main_menu = tree.backing_mut().add_child(root, "MainMenu")?;
    let menu = tree.attach(main_menu, NodeOrigin::host(), None, &[])?;

    for (id, label, shortcuts) in [
        ("Open", "menu.open", "Ctrl+O"),
        ("Save", "menu.save", "Ctrl+S, Cmd+S"),
    ] {
        attach_item(&mut tree, main_menu, &schema, id, label, shortcuts)?;
    }

    for child in tree.child_nodes(menu)?.iter() {
        let item = tree.data::<MenuItem>(child)?;
        println!(
            "{} label={:?} shortcuts={:?}",
            tree.path(child)?,
            item.label,
            item.shortcuts
        );
    }
    Ok(())
}

fn attach_item(
    tree: &mut ExtensionTree,
    parent: BackingNodeId,
    schema: &Arc<NodeTypeSchema>,
    id: &str,
    label: &str,
    shortcuts: &str,
) -> Result<(), BoxError> {
    let backing = tree.backing_mut().add_child(parent, id)?;
    tree.attach(
        backing,
        NodeOrigin::addin("demo.editor"),
        Some(Arc::clone(schema)),
        &[
            Attribute::new("label", label),
            Attribute::new("shortcuts", shortcuts),
        ],
    )?;
    Ok(())
}
