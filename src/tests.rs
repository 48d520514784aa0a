/*!
 * Tests for dacmap functionality
 */

use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use tempfile::tempdir;

use crate::codec::{self, CatalogExport, TreeExport};
use crate::config::Config;
use crate::error::{DacMapError, Result};
use crate::parser::DumpParser;
use crate::permissions::PlatformPermissions;
use crate::report::{self, ListingFilter};
use crate::resolver::{collapse_path, resolve};
use crate::types::{FileEntry, FileTree, FileType};

const SAMPLE_DUMP: &str = "\
.:
total 24
drwxr-xr-x 21 root root u:object_r:rootfs:s0 4096 2021-03-01 10:15 .
drwxr-xr-x 21 root root u:object_r:rootfs:s0 4096 2021-03-01 10:15 ..
drwxr-xr-x 4 root shell u:object_r:system_file:s0 4096 2021-03-01 10:15 system
lrwxrwxrwx 1 root root u:object_r:rootfs:s0 13 2021-03-01 10:15 sdcard -> /system/media
lrwxrwxrwx 1 root root u:object_r:rootfs:s0 7 2021-03-01 10:15 dangling -> /vendor
brw------- 1 root disk u:object_r:block_device:s0 179,  0 2021-03-01 10:15 mmcblk0
ls: ./lost+found: Permission denied

./system:
total 16
drwxr-xr-x 4 root shell u:object_r:system_file:s0 4096 2021-03-01 10:15 .
drwxr-xr-x 21 root root u:object_r:rootfs:s0 4096 2021-03-01 10:15 ..
-rwxr-xr-- 1 root shell u:object_r:system_file:s0 8448 2021-02-14 08:00 init.rc
drwxr-xr-x 2 media media u:object_r:media_data_file:s0:c512,c768 4096 2021-03-01 10:15 media
drwx------ 2 root root u:object_r:system_data_file:s0 4096 2021-03-01 10:15 locked
ls: locked: Permission denied
ls: ./system/stale: No such file or directory

./system/media:
total 8
drwxr-xr-x 2 media media u:object_r:media_data_file:s0:c512,c768 4096 2021-03-01 10:15 .
drwxr-xr-x 4 root shell u:object_r:system_file:s0 4096 2021-03-01 10:15 ..
-rw-r--r-- 1 media audio u:object_r:media_data_file:s0 2048 2021-01-05 23:59 bootanim.zip
";

const PERMISSIONS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<permissions>
    <permission name="android.permission.BLUETOOTH_ADMIN">
        <group gid="net_bt_admin" />
    </permission>
    <permission name="android.permission.NET_TUNNELING">
        <group gid="vpn" />
        <group gid="net_admin" />
    </permission>
    <assign-permission name="android.permission.MODIFY_AUDIO_SETTINGS" uid="media" />
    <assign-permission name="android.permission.ACCESS_SURFACE_FLINGER" uid="media" />
</permissions>
"#;

// Helper to parse an in-memory dump into a tree
fn parse_dump(dump: &str) -> Result<FileTree> {
    let mut parser = DumpParser::new(Arc::new(ProgressBar::hidden()));
    parser.parse_str(dump)?;
    Ok(parser.finish())
}

fn sample_tree() -> FileTree {
    parse_dump(SAMPLE_DUMP).expect("sample dump parses")
}

// Helper to look an entry up by full path
fn find<'a>(tree: &'a FileTree, path: &str) -> &'a FileEntry {
    tree.entries
        .iter()
        .find(|e| e.full_path() == path)
        .unwrap_or_else(|| panic!("no entry for '{}'", path))
}

fn catalog_of(users: &[&str], groups: &[&str]) -> PlatformPermissions {
    let mut catalog = PlatformPermissions::new();
    for user in users {
        catalog.add_user_permission(user, "android.permission.INTERNET");
    }
    for group in groups {
        catalog.add_group_permission(group, "android.permission.INTERNET");
    }
    catalog
}

// Terminal full path of every recorded traversal path, in order
fn terminals(paths: &Option<Vec<Vec<FileEntry>>>) -> Vec<String> {
    paths
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|path| path.last().expect("non-empty path").full_path())
        .collect()
}

// --- Entity model ---

#[test]
fn test_full_path_join() {
    let tree = sample_tree();
    let root = find(&tree, "/");
    assert!(root.is_root());
    assert_eq!(root.full_path(), "/");

    // No double separators anywhere in the tree
    for entry in &tree.entries {
        assert!(
            !entry.full_path().contains("//"),
            "double separator in '{}'",
            entry.full_path()
        );
    }
    assert_eq!(find(&tree, "/system/init.rc").name, "init.rc");
    assert_eq!(find(&tree, "/system/init.rc").directory_path, "/system");
}

#[test]
fn test_permission_string_round_trip() {
    let tree = sample_tree();
    assert_eq!(find(&tree, "/system/init.rc").permission_string(), "-rwxr-xr--");
    assert_eq!(find(&tree, "/system").permission_string(), "drwxr-xr-x");
    assert_eq!(find(&tree, "/mmcblk0").permission_string(), "brw-------");
    assert_eq!(find(&tree, "/lost+found").permission_string(), "??????????");
}

#[test]
fn test_selinux_context_display() {
    let tree = sample_tree();
    let media = find(&tree, "/system/media");
    let context = media.selinux_context.as_ref().unwrap();
    assert_eq!(
        context.categories.as_deref(),
        Some(&["c512".to_string(), "c768".to_string()][..])
    );
    assert_eq!(context.to_string(), "u:object_r:media_data_file:s0:c512,c768");

    let plain = find(&tree, "/system").selinux_context.as_ref().unwrap();
    assert_eq!(plain.to_string(), "u:object_r:system_file:s0");
}

// --- Record parsing ---

#[test]
fn test_permission_bit_decode() {
    let tree = sample_tree();
    let entry = find(&tree, "/system/init.rc");
    assert_eq!(entry.user_permissions, Some(7));
    assert_eq!(entry.group_permissions, Some(5));
    assert_eq!(entry.global_permissions, Some(4));
    assert!(!entry.is_set_uid);
    assert!(!entry.is_set_gid);
    assert!(!entry.is_sticky);
}

#[test]
fn test_setuid_without_execute() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
-rwSr--r-- 1 root root u:object_r:rootfs:s0 64 2021-01-01 00:00 upper
-rwsr--r-- 1 root root u:object_r:rootfs:s0 64 2021-01-01 00:00 lower
";
    let tree = parse_dump(dump).unwrap();
    let upper = find(&tree, "/upper");
    assert!(upper.is_set_uid);
    assert_eq!(upper.user_permissions, Some(6));
    let lower = find(&tree, "/lower");
    assert!(lower.is_set_uid);
    assert_eq!(lower.user_permissions, Some(7));
}

#[test]
fn test_sticky_and_setgid_bits() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
drwxrwsr-t 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 shared
";
    let tree = parse_dump(dump).unwrap();
    let shared = find(&tree, "/shared");
    assert!(shared.is_set_gid);
    assert!(shared.is_sticky);
    assert_eq!(shared.group_permissions, Some(7));
    assert_eq!(shared.global_permissions, Some(5));
    assert_eq!(shared.permission_string(), "drwxrwsr-t");
}

#[test]
fn test_root_normalization() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
./subdir:
-rw-r--r-- 1 root root u:object_r:rootfs:s0 5 2021-01-01 00:00 child
";
    let tree = parse_dump(dump).unwrap();
    assert_eq!(tree.len(), 2);
    let root = &tree.entries[0];
    assert_eq!(root.name, "/");
    assert_eq!(root.directory_path, "");
    let child = &tree.entries[1];
    assert_eq!(child.directory_path, "/subdir");
    assert_eq!(child.name, "child");
}

#[test]
fn test_dot_entries_dropped() {
    let tree = sample_tree();
    assert!(tree.entries.iter().all(|e| e.name != "." && e.name != ".."));
}

#[test]
fn test_symlink_target_resolution() {
    let tree = sample_tree();
    let sdcard = find(&tree, "/sdcard");
    assert_eq!(sdcard.link_path.as_deref(), Some("/system/media"));
    let target = &tree.entries[sdcard.link_entry.expect("resolved link")];
    assert_eq!(target, find(&tree, "/system/media"));

    // Targets outside the observed tree are not errors
    let dangling = find(&tree, "/dangling");
    assert_eq!(dangling.link_path.as_deref(), Some("/vendor"));
    assert!(dangling.link_entry.is_none());
}

#[test]
fn test_relative_symlink_target() {
    let dump = "\
.:
drwxr-xr-x 3 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 system
./system:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
lrwxrwxrwx 1 root root u:object_r:rootfs:s0 10 2021-01-01 00:00 etc -> ../vendor/etc
";
    let tree = parse_dump(dump).unwrap();
    let link = find(&tree, "/system/etc");
    assert_eq!(link.link_path.as_deref(), Some("/vendor/etc"));
}

#[test]
fn test_device_id_split() {
    let tree = sample_tree();
    let device = find(&tree, "/mmcblk0");
    assert_eq!(device.file_type, FileType::BlockDevice);
    assert_eq!(device.major_device_id.as_deref(), Some("179"));
    assert_eq!(device.minor_device_id.as_deref(), Some("0"));
    assert!(device.size.is_none());

    // Non-devices keep the literal size and no device ids
    let file = find(&tree, "/system/init.rc");
    assert_eq!(file.size.as_deref(), Some("8448"));
    assert!(file.major_device_id.is_none());
}

#[test]
fn test_timestamp_normalization() {
    let tree = sample_tree();
    let file = find(&tree, "/system/media/bootanim.zip");
    assert_eq!(file.mod_date_time.as_deref(), Some("[2021-01-05 23:59]"));
}

#[test]
fn test_permission_denied_unlisted_object() {
    let tree = sample_tree();
    let hidden = find(&tree, "/lost+found");
    assert!(hidden.is_no_access);
    assert_eq!(hidden.file_type, FileType::Unknown);
    assert_eq!(hidden.directory_path, "/");
    assert!(hidden.user.is_none());
    assert!(hidden.size.is_none());
}

#[test]
fn test_permission_denied_marks_listed_directory() {
    let tree = sample_tree();
    let locked = find(&tree, "/system/locked");
    assert!(locked.is_no_access);
    assert_eq!(locked.file_type, FileType::Directory);
    // The directory keeps the metadata from its child record
    assert_eq!(locked.user.as_deref(), Some("root"));
}

#[test]
fn test_permission_denied_without_candidate_fails() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
ls: phantom: Permission denied
";
    let err = parse_dump(dump).unwrap_err();
    assert!(matches!(err, DacMapError::Parse(_)), "got {:?}", err);
    assert!(err.to_string().contains("phantom"));
}

#[test]
fn test_ignored_lines() {
    let dump = "\
.:
# a comment
total 12

ls: ./gone: No such file or directory
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
";
    let tree = parse_dump(dump).unwrap();
    assert_eq!(tree.len(), 1);
    assert!(tree.entries[0].is_root());
}

#[test]
fn test_unknown_file_type_fails() {
    let dump = "\
.:
qrwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 odd
";
    let err = parse_dump(dump).unwrap_err();
    assert!(matches!(err, DacMapError::Parse(_)));
    assert!(err.to_string().contains("unknown file type"));
}

#[test]
fn test_invalid_permission_string_fails() {
    let dump = "\
.:
drwxr-xr-q 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 odd
";
    let err = parse_dump(dump).unwrap_err();
    assert!(err.to_string().contains("invalid permission string"));
}

#[test]
fn test_invalid_label_fails() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r 4096 2021-01-01 00:00 odd
";
    let err = parse_dump(dump).unwrap_err();
    assert!(err.to_string().contains("unknown label format"));
}

#[test]
fn test_invalid_timestamp_fails() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-13-01 00:00 odd
";
    let err = parse_dump(dump).unwrap_err();
    assert!(err.to_string().contains("invalid timestamp"));
}

#[test]
fn test_record_before_any_header_fails() {
    let dump = "drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 stray\n";
    let err = parse_dump(dump).unwrap_err();
    assert!(matches!(err, DacMapError::Parse(_)));
}

#[test]
fn test_unparseable_line_fails() {
    let err = parse_dump(".:\nnot a listing record\n").unwrap_err();
    assert!(err.to_string().contains("unable to parse line"));
}

// --- Permission catalog ---

#[test]
fn test_catalog_parse_xml() {
    let mut catalog = PlatformPermissions::new();
    catalog.parse_xml(PERMISSIONS_XML, "platform.xml").unwrap();

    let groups: Vec<&str> = catalog.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["net_bt_admin", "vpn", "net_admin"]);
    assert_eq!(
        catalog.groups[1].permissions,
        vec!["android.permission.NET_TUNNELING"]
    );

    assert_eq!(catalog.users.len(), 1);
    assert_eq!(catalog.users[0].name, "media");
    assert_eq!(
        catalog.users[0].permissions,
        vec![
            "android.permission.MODIFY_AUDIO_SETTINGS",
            "android.permission.ACCESS_SURFACE_FLINGER"
        ]
    );
    assert!(catalog.users[0].paths.is_none());
}

#[test]
fn test_catalog_keeps_duplicate_permissions() {
    let mut catalog = PlatformPermissions::new();
    catalog.add_group_permission("inet", "android.permission.INTERNET");
    catalog.add_group_permission("inet", "android.permission.INTERNET");
    assert_eq!(catalog.groups.len(), 1);
    assert_eq!(catalog.groups[0].permissions.len(), 2);
}

#[test]
fn test_catalog_missing_attributes_fail() {
    let mut catalog = PlatformPermissions::new();

    let err = catalog
        .parse_xml(r#"<permissions><permission><group gid="x"/></permission></permissions>"#, "p.xml")
        .unwrap_err();
    assert!(err.to_string().contains("missing permission name"));

    let err = catalog
        .parse_xml(r#"<permissions><permission name="p"><group/></permission></permissions>"#, "p.xml")
        .unwrap_err();
    assert!(err.to_string().contains("no gid"));

    let err = catalog
        .parse_xml(r#"<permissions><assign-permission name="p"/></permissions>"#, "p.xml")
        .unwrap_err();
    assert!(err.to_string().contains("missing uid"));
}

#[test]
fn test_catalog_load_directory() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(
        dir.path().join("a.xml"),
        r#"<permissions><assign-permission name="android.permission.CAMERA" uid="camera"/></permissions>"#,
    )?;
    std::fs::write(
        dir.path().join("b.xml"),
        r#"<permissions><permission name="android.permission.INTERNET"><group gid="inet"/></permission></permissions>"#,
    )?;
    std::fs::write(dir.path().join("notes.txt"), "not xml")?;

    let mut catalog = PlatformPermissions::new();
    catalog.load_path(dir.path())?;
    assert_eq!(catalog.users.len(), 1);
    assert_eq!(catalog.groups.len(), 1);
    assert_eq!(catalog.identity_count(), 2);
    Ok(())
}

// --- Reachability resolution ---

#[test]
fn test_resolver_finalizes_leaves_before_ancestors() {
    let dump = "\
.:
drwxr-xr-x 3 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 a
./a:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 b
./a/b:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
-rw-r--r-- 1 root root u:object_r:rootfs:s0 10 2021-01-01 00:00 c.txt
";
    let tree = parse_dump(dump).unwrap();
    let resolved = resolve(&catalog_of(&["root"], &[]), &tree).unwrap();
    assert_eq!(
        terminals(&resolved.users[0].paths),
        vec!["/a/b/c.txt", "/a/b", "/a", "/"]
    );
}

#[test]
fn test_resolver_matches_users_and_groups_independently() {
    let tree = sample_tree();
    let resolved = resolve(&catalog_of(&["media"], &["audio"]), &tree).unwrap();

    let media_paths = terminals(&resolved.users[0].paths);
    assert!(media_paths.contains(&"/system/media".to_string()));
    assert!(media_paths.contains(&"/system/media/bootanim.zip".to_string()));

    // bootanim.zip is media:audio, so it finalizes into both lists
    let audio_paths = terminals(&resolved.groups[0].paths);
    assert!(audio_paths.contains(&"/system/media/bootanim.zip".to_string()));
}

#[test]
fn test_resolver_follows_symlink_edges() {
    let tree = sample_tree();
    let resolved = resolve(&catalog_of(&["media"], &[]), &tree).unwrap();
    // /system/media is reachable both directly and through /sdcard
    let paths = resolved.users[0].paths.as_deref().unwrap();
    let via_link = paths
        .iter()
        .filter(|path| path.iter().any(|e| e.name == "sdcard"))
        .count();
    assert!(via_link >= 1, "expected at least one traversal through the symlink");
}

#[test]
fn test_resolver_survives_mutual_symlink_cycle() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
lrwxrwxrwx 1 root root u:object_r:rootfs:s0 2 2021-01-01 00:00 x -> /y
lrwxrwxrwx 1 root root u:object_r:rootfs:s0 2 2021-01-01 00:00 y -> /x
";
    let tree = parse_dump(dump).unwrap();
    let resolved = resolve(&catalog_of(&["root"], &[]), &tree).unwrap();
    assert_eq!(
        terminals(&resolved.users[0].paths),
        vec!["/y", "/x", "/x", "/y", "/"]
    );
}

#[test]
fn test_resolver_prunes_proc_fd() {
    let dump = "\
.:
drwxr-xr-x 3 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
drwxr-xr-x 3 root root u:object_r:proc:s0 0 2021-01-01 00:00 proc
./proc:
drwxr-xr-x 3 root root u:object_r:proc:s0 0 2021-01-01 00:00 .
drwxr-xr-x 2 root root u:object_r:proc:s0 0 2021-01-01 00:00 123
./proc/123:
drwxr-xr-x 2 root root u:object_r:proc:s0 0 2021-01-01 00:00 .
drwxr-xr-x 2 root root u:object_r:proc:s0 0 2021-01-01 00:00 fd
./proc/123/fd:
drwxr-xr-x 2 root root u:object_r:proc:s0 0 2021-01-01 00:00 .
lrwxrwxrwx 1 root root u:object_r:proc:s0 64 2021-01-01 00:00 3 -> /proc/123
";
    let tree = parse_dump(dump).unwrap();
    let resolved = resolve(&catalog_of(&["root"], &[]), &tree).unwrap();
    let paths = terminals(&resolved.users[0].paths);
    assert!(paths.contains(&"/proc/123/fd".to_string()));
    assert!(
        !paths.iter().any(|p| p.starts_with("/proc/123/fd/")),
        "descended into a pruned subtree: {:?}",
        paths
    );
}

#[test]
fn test_resolver_requires_root() {
    let mut tree = FileTree::new();
    let mut orphan = FileEntry::no_access("a", "/");
    orphan.file_type = FileType::Directory;
    tree.entries.push(orphan);
    let err = resolve(&catalog_of(&["root"], &[]), &tree).unwrap_err();
    assert!(matches!(err, DacMapError::Integrity(_)));
    assert!(err.to_string().contains("root"));
}

#[test]
fn test_resolver_requires_parents() {
    let dump = "\
.:
drwxr-xr-x 2 root root u:object_r:rootfs:s0 4096 2021-01-01 00:00 .
ls: ./ghost/child: Permission denied
";
    let tree = parse_dump(dump).unwrap();
    let err = resolve(&catalog_of(&["root"], &[]), &tree).unwrap_err();
    assert!(matches!(err, DacMapError::Integrity(_)));
    assert!(err.to_string().contains("/ghost"));
}

#[test]
fn test_resolver_leaves_inputs_untouched() {
    let tree = sample_tree();
    let catalog = catalog_of(&["root"], &["shell"]);
    let before = catalog.clone();
    let resolved = resolve(&catalog, &tree).unwrap();
    assert_eq!(catalog, before);
    assert!(resolved.users[0].paths.is_some());
    assert!(catalog.users[0].paths.is_none());
}

#[test]
fn test_collapse_path_through_symlink() {
    let tree = sample_tree();
    let root = find(&tree, "/").clone();
    let link = find(&tree, "/sdcard").clone();
    let target = find(&tree, "/system/media").clone();

    let collapsed = collapse_path(&[root.clone(), link, target]).unwrap();
    // The route keeps the link's name but carries the target's metadata
    assert_eq!(collapsed.full_path(), "/sdcard");
    assert_eq!(collapsed.user.as_deref(), Some("media"));
    assert_eq!(collapsed.file_type, FileType::Directory);

    let collapsed_root = collapse_path(&[root]).unwrap();
    assert!(collapsed_root.is_root());

    assert!(matches!(
        collapse_path(&[]),
        Err(DacMapError::Integrity(_))
    ));
}

// --- Codec ---

#[test]
fn test_tree_snapshot_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree_db.bin");
    let tree = sample_tree();

    codec::write_snapshot(&path, &tree)?;
    let decoded: FileTree = codec::read_snapshot(&path)?;
    assert_eq!(decoded, tree);

    // The symlink back-reference is restored to an entry equal to the
    // original target, not merely path-equal
    let link = find(&decoded, "/sdcard");
    let target = &decoded.entries[link.link_entry.unwrap()];
    assert_eq!(target, find(&tree, "/system/media"));
    Ok(())
}

#[test]
fn test_catalog_snapshot_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("catalog_db.bin");
    let tree = sample_tree();
    let resolved = resolve(&catalog_of(&["media"], &["audio"]), &tree).unwrap();

    codec::write_snapshot(&path, &resolved)?;
    let decoded: PlatformPermissions = codec::read_snapshot(&path)?;
    assert_eq!(decoded, resolved);
    Ok(())
}

#[test]
fn test_canonical_export_field_order() {
    let tree = sample_tree();
    let json = serde_json::to_string_pretty(&TreeExport::new(&tree)).unwrap();

    // Declaration order is the priority table
    let idx = |needle: &str| json.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
    assert!(idx("\"name\"") < idx("\"directoryPath\""));
    assert!(idx("\"directoryPath\"") < idx("\"type\""));
    assert!(idx("\"type\"") < idx("\"user\""));
    assert!(idx("\"user\"") < idx("\"modDateTime\""));

    // Device entries carry ids instead of a size
    assert!(json.contains("\"majorDeviceId\": \"179\""));
    // False booleans and absent options are omitted
    assert!(!json.contains("\"isSetUID\""));
    // The resolved symlink renders a shallow reference
    assert!(json.contains("\"linkEntry\""));
    assert!(json.contains("\"seCategories\""));
}

#[test]
fn test_canonical_catalog_export_shape() {
    let tree = sample_tree();
    let resolved = resolve(&catalog_of(&["media"], &[]), &tree).unwrap();
    let json = serde_json::to_string_pretty(&CatalogExport::new(&resolved, Some(&tree))).unwrap();

    let idx = |needle: &str| json.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
    assert!(idx("\"users\"") < idx("\"groups\""));
    assert!(idx("\"name\"") < idx("\"permissions\""));
    assert!(idx("\"permissions\"") < idx("\"paths\""));
}

// --- Reports ---

#[test]
fn test_render_entries_columns() {
    let tree = sample_tree();
    let rendered = report::render_entries(&tree.entries, "", &ListingFilter::default());
    assert!(rendered.starts_with(&format!("File Entries [Size={}]:\n", tree.len())));
    // Symlinks carry their target
    assert!(rendered.contains("/sdcard -> /system/media"));
    // Unknown entries render placeholders for every column; the hard-link
    // column is two wide here, so the placeholder right-justifies
    assert!(rendered.contains("??????????  ?"));
    assert!(rendered.contains("[????-??-?? ??:??] /lost+found"));
    // Device ids render in the size column
    assert!(rendered.contains("179, 0 "));

    // Columns right-justify to the widest value: "audio" (5) pads "root"
    assert!(rendered.contains(" root  root "));
}

#[test]
fn test_render_entries_filters() {
    let tree = sample_tree();
    let links_only = report::render_entries(
        &tree.entries,
        "",
        &ListingFilter {
            exclude_prefix: None,
            only_type: Some(FileType::Symlink),
        },
    );
    assert!(links_only.starts_with("File Entries [Size=2]:\n"));
    assert!(links_only.contains("/sdcard"));
    assert!(!links_only.contains("init.rc"));

    let excluded = report::render_entries(
        &tree.entries,
        "",
        &ListingFilter {
            exclude_prefix: Some("/system/"),
            only_type: None,
        },
    );
    assert!(!excluded.contains("init.rc"));
    assert!(excluded.contains("/system\n"));
}

#[test]
fn test_render_catalog_totals() {
    let tree = sample_tree();
    let resolved = resolve(&catalog_of(&["media"], &["audio"]), &tree).unwrap();
    let rendered = report::render_catalog(&resolved, None).unwrap();

    // /system/media/bootanim.zip is media:audio and is reachable both
    // directly and through the /sdcard symlink, so it counts twice
    assert!(rendered.starts_with("Total File Entries: 6\n"));
    assert!(rendered.contains("Total User File Entries: 4\n"));
    assert!(rendered.contains("Total Group File Entries: 2\n"));
    assert!(rendered.contains("User: media\n"));
    assert!(rendered.contains("Group: audio\n"));
    assert!(rendered.contains("    android.permission.INTERNET\n"));

    // Exclusion changes the counts, not just the listings
    let trimmed = report::render_catalog(&resolved, Some("/system/")).unwrap();
    assert_ne!(rendered, trimmed);
}

// --- Configuration ---

#[test]
fn test_artifact_keys_naming() {
    let config = Config {
        working_dir: "/work".into(),
        dump_files: vec![],
        permissions_path: None,
        write_json: false,
        find_users_and_groups: false,
        num_threads: 1,
    };
    let keys = config.artifact_keys(Path::new("/work/ls_dump.txt"));
    assert_eq!(keys.tree_snapshot, Path::new("/work/ls_dump_db.bin"));
    assert_eq!(keys.tree_export, Path::new("/work/ls_dump_db.json"));
    assert_eq!(
        keys.resolved_snapshot,
        Path::new("/work/ls_dump_and_platform-permissions_db.bin")
    );
    assert_eq!(
        keys.report_no_proc,
        Path::new("/work/ls_dump_and_platform-permissions_no_proc.txt")
    );
    assert_eq!(keys.links_report, Path::new("/work/ls_dump_links_only.txt"));
    assert_eq!(
        config.permissions_snapshot_path(),
        Path::new("/work/platform-permissions_db.bin")
    );
}

#[test]
fn test_artifact_exists_predicate() -> Result<()> {
    let dir = tempdir()?;
    let present = dir.path().join("present.bin");
    std::fs::write(&present, b"x")?;
    assert!(Config::artifact_exists(&present));
    assert!(!Config::artifact_exists(&dir.path().join("absent.bin")));
    Ok(())
}
