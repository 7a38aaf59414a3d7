//! End-to-end pipeline tests against scripted collaborators


use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use harness::{
    FakeExtractor, Harness, SimpleCopyInstaller, StaticInstaller, GAME, PROFILE,
};

use crate::api::{CollisionChoice, Event, ModStore, UpgradeChoice};
use crate::core::error::InstallError;
use crate::core::Result;
use crate::instructions::{
    IniEdit, Instruction, InstallerError, InstructionErrorKind, InstructionProcessor, Submodule,
};
use crate::model::{
    attr, Dependency, DownloadInfo, DownloadState, GatherOutcome, LookupResult, ModEntry,
    ModReference, ModRule, ModState, RuleType,
};

fn no_submodules(_submodule: Submodule) -> BoxFuture<'static, Result<Option<String>>> {
    Box::pin(async { Ok(None) })
}

fn requires(logical_name: &str) -> ModRule {
    ModRule::new(
        RuleType::Requires,
        ModReference {
            logical_file_name: Some(logical_name.to_owned()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn plain_copy_install() {
    let harness = Harness::new(FakeExtractor::unpacking(&[
        ("readme.txt", b"read me"),
        ("data/a.dat", b"aaaa"),
    ]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    assert_eq!(mod_id, "Foo-1.0");
    let mod_dir = harness.mod_dir(&mod_id);
    assert_eq!(
        std::fs::read(mod_dir.join("readme.txt")).unwrap(),
        b"read me"
    );
    assert_eq!(std::fs::read(mod_dir.join("data/a.dat")).unwrap(), b"aaaa");
    assert!(!harness.staging_dir(&mod_id).exists());

    let entry = harness.store.mod_entry(GAME, &mod_id).unwrap();
    assert_eq!(entry.state, ModState::Installed);
    assert!(entry.attributes.contains_key(attr::FILE_MD5));

    assert_eq!(
        harness
            .events
            .count(|event| matches!(event, Event::WillInstallMod { .. })),
        1
    );
    assert_eq!(
        harness
            .events
            .count(|event| matches!(event, Event::DidInstallMod { .. })),
        1
    );
}

#[tokio::test]
async fn damaged_archive_fails_and_cleans_up() {
    let harness = Harness::new(FakeExtractor::reporting(2, &["Unexpected end of archive"]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let err = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ArchiveBroken(_)));
    assert!(!harness.staging_dir("Foo-1.0").exists());
    assert!(!harness.mod_dir("Foo-1.0").exists());
    assert!(harness.store.mod_entry(GAME, "Foo-1.0").is_none());
    assert!(harness.frontend.notification_titled("Installation failed"));
}

#[tokio::test]
async fn non_archive_becomes_single_file_mod() {
    let harness = Harness::new(FakeExtractor::reporting(2, &["Cannot open as archive"]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));
    harness.frontend.single_file.lock().unwrap().push_back(true);

    let mod_id = harness
        .manager
        .install(harness.request("manual.esp"))
        .await
        .unwrap();

    assert_eq!(mod_id, "manual");
    let installed = harness.mod_dir(&mod_id).join("manual.esp");
    assert_eq!(std::fs::read(installed).unwrap(), b"archive-bytes");
    assert!(!harness.staging_dir(&mod_id).exists());
}

#[tokio::test]
async fn declining_single_file_mod_cancels() {
    let harness = Harness::new(FakeExtractor::reporting(2, &["Cannot open as archive"]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let err = harness
        .manager
        .install(harness.request("manual.esp"))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::UserCanceled));
    assert!(harness.store.mod_entry(GAME, "manual").is_none());
}

#[tokio::test]
async fn fatal_installer_error_persists_nothing() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("x", b"x")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller {
            instructions: Some(vec![
                Instruction::Error(InstallerError {
                    value: InstructionErrorKind::Fatal,
                    source: "broken installer".into(),
                }),
                Instruction::copy("x", "x"),
            ]),
        }),
    );

    let err = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ProcessCanceled(_)));
    assert!(!harness.mod_dir("Foo-1.0").exists());
    assert!(!harness.staging_dir("Foo-1.0").exists());
    assert!(harness.store.mod_entry(GAME, "Foo-1.0").is_none());
}

#[tokio::test]
async fn empty_instruction_list_cancels() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("x", b"x")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller {
            instructions: Some(Vec::new()),
        }),
    );

    let err = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::ProcessCanceled(_)));
}

#[tokio::test]
async fn installer_returning_none_means_user_canceled() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("x", b"x")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller { instructions: None }),
    );

    let err = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::UserCanceled));
}

#[tokio::test]
async fn missing_installer_is_a_setup_error() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("x", b"x")]));

    let err = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Setup(_)));
}

#[tokio::test]
async fn extraction_warnings_can_be_continued() {
    let harness = Harness::new(FakeExtractor {
        files: vec![("readme.txt".to_owned(), b"hi".to_vec())],
        report: crate::extract::ExtractReport {
            code: 1,
            errors: vec!["minor glitch".into()],
        },
    });
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));
    harness
        .frontend
        .extraction_continue
        .lock()
        .unwrap()
        .push_back(true);

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();
    assert!(harness.mod_dir(&mod_id).join("readme.txt").exists());
}

#[tokio::test]
async fn name_collision_variant_never_removes_the_prior_mod() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));
    harness
        .store
        .seed_mod(GAME, ModEntry::new("Foo-1.0", ModState::Installed));
    harness
        .frontend
        .collision
        .lock()
        .unwrap()
        .push_back(Some(CollisionChoice::Variant("hd".into())));

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    assert_eq!(mod_id, "Foo-1.0+hd");
    assert!(harness.removed().is_empty());
    assert!(harness.store.mod_entry(GAME, "Foo-1.0").is_some());
    assert!(!harness.store.is_enabled(PROFILE, &mod_id));
}

#[tokio::test]
async fn name_collision_replace_keeps_id_and_enabled_state() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let mut prior = ModEntry::new("Foo-1.0", ModState::Installed);
    prior
        .attributes
        .insert(attr::VERSION.into(), Value::from("0.9"));
    prior
        .attributes
        .insert("notes".into(), Value::from("keep me"));
    harness.store.seed_mod(GAME, prior);
    harness.store.enable(PROFILE, "Foo-1.0");
    harness
        .frontend
        .collision
        .lock()
        .unwrap()
        .push_back(Some(CollisionChoice::Replace));

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    assert_eq!(mod_id, "Foo-1.0");
    assert_eq!(harness.removed(), vec!["Foo-1.0".to_owned()]);
    let entry = harness.store.mod_entry(GAME, &mod_id).unwrap();
    assert_eq!(entry.attr_str("notes"), Some("keep me"));
    assert_ne!(entry.attr_str(attr::VERSION), Some("0.9"));
    assert!(harness.store.is_enabled(PROFILE, &mod_id));
}

#[tokio::test]
async fn version_replace_inherits_rules_and_overrides() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let mut prior = ModEntry::new("m1", ModState::Installed);
    prior
        .attributes
        .insert(attr::NEWEST_FILE_ID.into(), Value::from("42"));
    prior
        .attributes
        .insert(attr::FILE_ID.into(), Value::from("10"));
    prior.rules.push(requires("SkyUI"));
    prior.file_overrides.push("textures/f1.dds".into());
    harness.store.seed_mod(GAME, prior);
    harness.store.enable(PROFILE, "m1");

    harness.lookup.results.lock().unwrap().push(LookupResult {
        file_id: Some("42".into()),
        file_version: Some("2.0".into()),
        ..Default::default()
    });
    harness
        .frontend
        .upgrade
        .lock()
        .unwrap()
        .push_back(Some(UpgradeChoice::Replace));

    let mod_id = harness
        .manager
        .install(harness.request("Foo-2.0.zip"))
        .await
        .unwrap();

    assert_eq!(mod_id, "m1");
    assert!(harness.removed().contains(&"m1".to_owned()));
    let entry = harness.store.mod_entry(GAME, "m1").unwrap();
    assert_eq!(entry.rules, vec![requires("SkyUI")]);
    assert_eq!(entry.file_overrides, vec!["textures/f1.dds".to_owned()]);
    assert!(harness.store.is_enabled(PROFILE, "m1"));
}

#[tokio::test]
async fn version_install_separately_keeps_both() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let mut prior = ModEntry::new("m1", ModState::Installed);
    prior
        .attributes
        .insert(attr::NEWEST_FILE_ID.into(), Value::from("42"));
    prior
        .attributes
        .insert(attr::FILE_ID.into(), Value::from("10"));
    harness.store.seed_mod(GAME, prior);
    harness.store.enable(PROFILE, "m1");

    harness.lookup.results.lock().unwrap().push(LookupResult {
        file_id: Some("42".into()),
        ..Default::default()
    });
    harness
        .frontend
        .upgrade
        .lock()
        .unwrap()
        .push_back(Some(UpgradeChoice::InstallSeparately));

    let mod_id = harness
        .manager
        .install(harness.request("Foo-2.0.zip"))
        .await
        .unwrap();

    assert_eq!(mod_id, "Foo-2.0");
    assert!(harness.store.mod_entry(GAME, "m1").is_some());
    // the prior version was enabled, so its successor comes up enabled too
    assert!(harness.store.is_enabled(PROFILE, "Foo-2.0"));
}

#[tokio::test]
async fn duplicated_copy_sources_fan_out() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("a.txt", b"hello")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller {
            instructions: Some(vec![
                Instruction::copy("a.txt", "x.txt"),
                Instruction::copy("a.txt", "y.txt"),
            ]),
        }),
    );

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    let mod_dir = harness.mod_dir(&mod_id);
    assert_eq!(std::fs::read(mod_dir.join("x.txt")).unwrap(), b"hello");
    assert_eq!(std::fs::read(mod_dir.join("y.txt")).unwrap(), b"hello");
    assert!(!harness.staging_dir(&mod_id).exists());
}

#[tokio::test]
async fn stale_staging_directory_is_purged() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let staging = harness.staging_dir("Foo-1.0");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join("leftover"), b"junk").unwrap();

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();
    assert!(!harness.staging_dir(&mod_id).exists());
    assert!(!harness.mod_dir(&mod_id).join("leftover").exists());
}

#[tokio::test]
async fn mod_type_probes_classify_untyped_installs() {
    struct PluginProbe {
        priority: i32,
        type_id: &'static str,
        matches: bool,
    }

    #[async_trait::async_trait]
    impl crate::ModTypeProbe for PluginProbe {
        fn type_id(&self) -> &str {
            self.type_id
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn test(&self, _instructions: &[Instruction]) -> Result<bool> {
            Ok(self.matches)
        }
    }

    let harness = Harness::new(FakeExtractor::unpacking(&[("a.esp", b"plugin")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));
    harness.manager.register_mod_type(
        GAME,
        Arc::new(PluginProbe {
            priority: 10,
            type_id: "low-priority",
            matches: true,
        }),
    );
    harness.manager.register_mod_type(
        GAME,
        Arc::new(PluginProbe {
            priority: 50,
            type_id: "plugin",
            matches: true,
        }),
    );

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    // the highest-priority matching probe decides the type
    let entry = harness.store.mod_entry(GAME, &mod_id).unwrap();
    assert_eq!(entry.mod_type, "plugin");
}

#[tokio::test]
async fn explicit_mod_type_instruction_wins_over_probes() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("a.esp", b"plugin")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller {
            instructions: Some(vec![
                Instruction::copy("a.esp", "a.esp"),
                Instruction::SetModType(crate::instructions::SetModType {
                    value: "collection".into(),
                }),
            ]),
        }),
    );

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    let entry = harness.store.mod_entry(GAME, &mod_id).unwrap();
    assert_eq!(entry.mod_type, "collection");
}

#[tokio::test]
async fn dialogs_of_concurrent_installs_never_interleave() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("readme.txt", b"hi")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    // two candidate games force the game-choice dialog in both pipelines
    let first = request_with_two_games(&harness, "Foo.zip");
    let second = request_with_two_games(&harness, "Bar.zip");

    let (a, b) = futures::join!(harness.manager.install(first), harness.manager.install(second));
    a.unwrap();
    b.unwrap();

    assert_eq!(
        harness
            .frontend
            .max_active
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

fn request_with_two_games(harness: &Harness, name: &str) -> crate::InstallRequest {
    crate::InstallRequest::new(harness.write_archive(name))
        .with_game(GAME)
        .with_game("fallout4")
        .with_profile(PROFILE)
}

#[tokio::test]
async fn ini_edits_render_identically_across_destinations() {
    let harness = Harness::new(FakeExtractor::unpacking(&[]));
    let api = harness.api();

    let temp = harness.dir.path().join("temp");
    let dest_a = harness.dir.path().join("dest_a");
    let dest_b = harness.dir.path().join("dest_b");
    for dir in [&temp, &dest_a, &dest_b] {
        std::fs::create_dir_all(dir).unwrap();
    }

    let instructions = vec![
        Instruction::IniEdit(IniEdit {
            destination: "tweaks.ini".into(),
            section: "Display".into(),
            key: "iSize W".into(),
            value: "1920".into(),
        }),
        Instruction::IniEdit(IniEdit {
            destination: "tweaks.ini".into(),
            section: "Display".into(),
            key: "iSize H".into(),
            value: "1080".into(),
        }),
        Instruction::IniEdit(IniEdit {
            destination: "tweaks.ini".into(),
            section: "General".into(),
            key: "bEnable".into(),
            value: "1".into(),
        }),
    ];

    for dest in [&dest_a, &dest_b] {
        let processor = InstructionProcessor::new(&api, GAME, "m", None, &temp, dest);
        processor
            .process(instructions.clone(), None, &no_submodules)
            .await
            .unwrap();
    }

    let rendered_a = std::fs::read(dest_a.join("Ini Tweaks/tweaks.ini")).unwrap();
    let rendered_b = std::fs::read(dest_b.join("Ini Tweaks/tweaks.ini")).unwrap();
    assert_eq!(rendered_a, rendered_b);
    let text = String::from_utf8(rendered_a).unwrap();
    assert!(text.starts_with("[Display]"));
    assert!(text.contains("iSize W = 1920"));
    assert!(text.contains("[General]"));
}

#[tokio::test]
async fn processor_moves_the_last_destination_of_a_shared_source() {
    let harness = Harness::new(FakeExtractor::unpacking(&[]));
    let api = harness.api();

    let temp = harness.dir.path().join("temp");
    let dest = harness.dir.path().join("dest");
    std::fs::create_dir_all(&temp).unwrap();
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(temp.join("shared.dat"), b"payload").unwrap();

    let processor = InstructionProcessor::new(&api, GAME, "m", None, &temp, &dest);
    processor
        .process(
            vec![
                Instruction::copy("shared.dat", "one.dat"),
                Instruction::copy("shared.dat", "two.dat"),
                Instruction::copy("shared.dat", "three.dat"),
            ],
            None,
            &no_submodules,
        )
        .await
        .unwrap();

    assert!(dest.join("one.dat").exists());
    assert!(dest.join("two.dat").exists());
    assert!(dest.join("three.dat").exists());
    // the final destination took ownership of the source
    assert!(!temp.join("shared.dat").exists());
}

#[tokio::test]
async fn missing_copy_sources_warn_but_do_not_abort() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("present.txt", b"here")]));
    harness.manager.register_installer(
        100,
        Arc::new(StaticInstaller {
            instructions: Some(vec![
                Instruction::copy("present.txt", "present.txt"),
                Instruction::copy("absent.txt", "absent.txt"),
            ]),
        }),
    );

    let mod_id = harness
        .manager
        .install(harness.request("Foo-1.0.zip"))
        .await
        .unwrap();

    assert!(harness.mod_dir(&mod_id).join("present.txt").exists());
    assert!(!harness.mod_dir(&mod_id).join("absent.txt").exists());
    assert!(harness.frontend.notification_titled("Installation incomplete"));
}

#[tokio::test]
async fn dependency_batch_resumes_downloads_installs_and_pins_rules() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("file.txt", b"dep")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    // parent with three requires rules
    let rule_a = requires("depA");
    let rule_b = requires("depB");
    let rule_c = requires("depC");
    let mut parent = ModEntry::new("parent", ModState::Installed);
    parent.rules = vec![rule_a.clone(), rule_b.clone(), rule_c.clone()];
    harness.store.seed_mod(GAME, parent);

    // A is installed and enabled already
    harness
        .store
        .seed_mod(GAME, ModEntry::new("depA-mod", ModState::Installed));
    harness.store.enable(PROFILE, "depA-mod");
    let mut dep_a = Dependency::from_rule(rule_a.clone());
    dep_a.existing_mod = Some("depA-mod".into());

    // B has a paused download
    let archive_b = harness.write_archive("depB.zip");
    harness.store.seed_download(DownloadInfo {
        id: "dl-b".into(),
        state: DownloadState::Paused,
        local_path: Some(archive_b),
        game_ids: vec![GAME.into()],
        file_md5: None,
        size: None,
    });
    let mut dep_b = Dependency::from_rule(rule_b.clone());
    dep_b.download = Some("dl-b".into());

    // C has nothing yet
    let archive_c = harness.write_archive("depC.zip");
    harness.downloads.serve("https://mods.example/depC.zip", &archive_c);
    let mut dep_c = Dependency::from_rule(rule_c.clone());
    dep_c.lookup_results.push(LookupResult {
        file_name: Some("depC.zip".into()),
        source_uri: Some("https://mods.example/depC.zip".into()),
        ..Default::default()
    });

    *harness.gatherer.outcomes.lock().unwrap() = vec![
        GatherOutcome::Resolved(dep_a),
        GatherOutcome::Resolved(dep_b),
        GatherOutcome::Resolved(dep_c),
    ];

    let report = harness
        .manager
        .install_dependencies(PROFILE, "parent", true)
        .await
        .unwrap();

    assert_eq!(harness.downloads.resumed.lock().unwrap().clone(), vec!["dl-b"]);
    assert_eq!(
        harness.downloads.started.lock().unwrap().clone(),
        vec!["https://mods.example/depC.zip"]
    );
    assert_eq!(report.reused, vec!["depA-mod"]);
    assert_eq!(report.installed.len(), 2);
    assert!(harness.store.mod_entry(GAME, "depB").is_some());
    assert!(harness.store.mod_entry(GAME, "depC").is_some());
    assert!(harness.store.is_enabled(PROFILE, "depB"));
    assert!(harness.store.is_enabled(PROFILE, "depC"));

    // every rule is pinned to the mod that satisfied it
    let parent = harness.store.mod_entry(GAME, "parent").unwrap();
    let pinned = |name: &str| {
        parent
            .rules
            .iter()
            .find(|rule| rule.reference.logical_file_name.as_deref() == Some(name))
            .and_then(|rule| rule.reference.id.clone())
    };
    assert_eq!(pinned("depA").as_deref(), Some("depA-mod"));
    assert_eq!(pinned("depB").as_deref(), Some("depB"));
    assert_eq!(pinned("depC").as_deref(), Some("depC"));

    assert_eq!(
        harness
            .events
            .count(|event| matches!(event, Event::WillInstallDependencies { .. })),
        1
    );
    assert_eq!(
        harness
            .events
            .count(|event| matches!(event, Event::DidInstallDependencies { .. })),
        1
    );
}

#[tokio::test]
async fn dependency_downloads_respect_the_concurrency_bound() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("file.txt", b"dep")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let mut parent = ModEntry::new("parent", ModState::Installed);
    let mut outcomes = Vec::new();
    for index in 0..8 {
        let rule = requires(&format!("dep{}", index));
        parent.rules.push(rule.clone());

        let archive = harness.write_archive(&format!("dep{}.zip", index));
        let uri = format!("https://mods.example/dep{}.zip", index);
        harness.downloads.serve(&uri, &archive);

        let mut dep = Dependency::from_rule(rule);
        dep.lookup_results.push(LookupResult {
            source_uri: Some(uri),
            ..Default::default()
        });
        outcomes.push(GatherOutcome::Resolved(dep));
    }
    harness.store.seed_mod(GAME, parent);
    *harness.gatherer.outcomes.lock().unwrap() = outcomes;

    let report = harness
        .manager
        .install_dependencies(PROFILE, "parent", true)
        .await
        .unwrap();

    assert_eq!(report.installed.len(), 8);
    let peak = harness
        .downloads
        .max_active
        .load(std::sync::atomic::Ordering::SeqCst);
    assert!(peak <= 4, "dependency parallelism exceeded 4 (saw {})", peak);
    assert!(peak >= 2, "batch never ran concurrently (saw {})", peak);
}

#[tokio::test]
async fn fuzzy_version_dependencies_download_through_the_update_channel() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("file.txt", b"dep")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let rule = ModRule::new(
        RuleType::Requires,
        ModReference {
            logical_file_name: Some("SkyUI".into()),
            version_match: Some(">=5.0.0".into()),
            ..Default::default()
        },
    );
    let mut parent = ModEntry::new("parent", ModState::Installed);
    parent.rules.push(rule.clone());
    harness.store.seed_mod(GAME, parent);

    let archive = harness.write_archive("SkyUI-5.2.zip");
    harness.downloads.serve("update:sk-42:f-7", &archive);

    let mut dep = Dependency::from_rule(rule);
    dep.lookup_results.push(LookupResult {
        mod_id: Some("sk-42".into()),
        file_id: Some("f-7".into()),
        source: Some("nexus".into()),
        domain_name: Some(GAME.into()),
        source_uri: Some("https://mods.example/direct.zip".into()),
        ..Default::default()
    });
    *harness.gatherer.outcomes.lock().unwrap() = vec![GatherOutcome::Resolved(dep)];

    let report = harness
        .manager
        .install_dependencies(PROFILE, "parent", true)
        .await
        .unwrap();

    assert_eq!(report.installed, vec!["SkyUI-5.2"]);
    assert_eq!(
        harness.downloads.started.lock().unwrap().clone(),
        vec!["update:sk-42:f-7"]
    );

    // md5 would over-constrain future updates of a fuzzy match
    let parent = harness.store.mod_entry(GAME, "parent").unwrap();
    assert!(parent.rules[0].reference.file_md5.is_none());
    assert_eq!(parent.rules[0].reference.id.as_deref(), Some("SkyUI-5.2"));
}

#[tokio::test]
async fn unresolvable_dependencies_are_dropped_not_fatal() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("file.txt", b"dep")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let rule = requires("ghost");
    let mut parent = ModEntry::new("parent", ModState::Installed);
    parent.rules.push(rule.clone());
    harness.store.seed_mod(GAME, parent);

    // no download, no lookup results: nothing to fetch from
    let dep = Dependency::from_rule(rule);
    *harness.gatherer.outcomes.lock().unwrap() = vec![GatherOutcome::Resolved(dep)];

    let report = harness
        .manager
        .install_dependencies(PROFILE, "parent", true)
        .await
        .unwrap();

    assert!(report.installed.is_empty());
    assert_eq!(report.dropped.len(), 1);
    assert!(harness.frontend.notification_titled("Dependency not installed"));
}

#[tokio::test]
async fn recommendations_install_only_the_selected_entries() {
    let harness = Harness::new(FakeExtractor::unpacking(&[("file.txt", b"dep")]));
    harness
        .manager
        .register_installer(100, Arc::new(SimpleCopyInstaller));

    let rule_x = ModRule::new(
        RuleType::Recommends,
        ModReference {
            logical_file_name: Some("optionalX".into()),
            ..Default::default()
        },
    );
    let rule_y = ModRule::new(
        RuleType::Recommends,
        ModReference {
            logical_file_name: Some("optionalY".into()),
            ..Default::default()
        },
    );
    let mut parent = ModEntry::new("parent", ModState::Installed);
    parent.rules = vec![rule_x.clone(), rule_y.clone()];
    harness.store.seed_mod(GAME, parent);

    for (rule, name) in [(rule_x, "optX"), (rule_y, "optY")] {
        let archive = harness.write_archive(&format!("{}.zip", name));
        let uri = format!("https://mods.example/{}.zip", name);
        harness.downloads.serve(&uri, &archive);
        let mut dep = Dependency::from_rule(rule);
        dep.lookup_results.push(LookupResult {
            source_uri: Some(uri),
            ..Default::default()
        });
        harness
            .gatherer
            .outcomes
            .lock()
            .unwrap()
            .push(GatherOutcome::Resolved(dep));
    }

    // only the first recommendation is ticked
    *harness.frontend.recommendation_picks.lock().unwrap() = Some(vec![0]);

    let report = harness
        .manager
        .install_recommendations(PROFILE, "parent")
        .await
        .unwrap();

    assert_eq!(report.installed, vec!["optX"]);
    assert!(harness.store.mod_entry(GAME, "optY").is_none());
}

impl Harness {
    fn removed(&self) -> Vec<String> {
        self.store.removed.lock().unwrap().clone()
    }
}
