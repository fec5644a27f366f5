mod common;

use common::{alice, as_owner, calls, deploy, open_core, owner, value_seen, Scripted};
use modtoken_core::{
    open_db_in_memory, CallEnv, CoreError, CoreVariant, ExtensionHost, Selector,
};

const ECHO: &str = "echo(bytes)";
const WHOAMI: &str = "whoami()";
const ADMIN: &str = "configure(bytes)";

#[test]
fn entrypoint_routes_data_and_caller() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let core = open_core(&conn, &host, CoreVariant::Fungible);
    let tools = deploy(
        &host,
        "ext.tools",
        Scripted::new("tools").exposes(ECHO, false).exposes(WHOAMI, false),
    );
    core.install(as_owner(), tools, &[]).expect("install");

    let echoed = core
        .call_entrypoint(CallEnv::new(alice()), Selector::from_signature(ECHO), b"ping")
        .expect("echo");
    assert_eq!(echoed, b"ping".to_vec());

    let caller = core
        .call_entrypoint(CallEnv::new(alice()), Selector::from_signature(WHOAMI), &[])
        .expect("whoami");
    assert_eq!(caller, alice().as_bytes().to_vec());
    assert_eq!(calls(&core, tools), 2);

    let entry = core
        .entrypoint_of(Selector::from_signature(ECHO))
        .expect("lookup")
        .expect("bound entrypoint");
    assert_eq!(entry.handler, tools);
    assert_eq!(entry.name, ECHO);
    assert!(!entry.restricted);
}

#[test]
fn restricted_entrypoint_requires_permission() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let core = open_core(&conn, &host, CoreVariant::Fungible);
    let admin = deploy(&host, "ext.admin", Scripted::new("admin").exposes(ADMIN, true));
    core.install(as_owner(), admin, &[]).expect("install");
    let selector = Selector::from_signature(ADMIN);

    assert!(matches!(
        core.call_entrypoint(CallEnv::new(alice()), selector, b"x"),
        Err(CoreError::Unauthorized { caller }) if caller == alice()
    ));
    assert_eq!(calls(&core, admin), 0);

    let reply = core
        .call_entrypoint(as_owner(), selector, b"x")
        .expect("owner may call");
    assert_eq!(reply, owner().as_bytes().to_vec());
}

#[test]
fn unknown_and_uninstalled_entrypoints_are_not_found() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let core = open_core(&conn, &host, CoreVariant::Fungible);
    let tools = deploy(&host, "ext.tools", Scripted::new("tools").exposes(ECHO, false));
    let selector = Selector::from_signature(ECHO);

    let err = core
        .call_entrypoint(CallEnv::new(alice()), selector, &[])
        .expect_err("nothing installed");
    assert!(matches!(err, CoreError::EntrypointNotFound(found) if found == selector));
    assert_eq!(err.to_string(), format!("entrypoint not found: {selector}"));

    core.install(as_owner(), tools, &[]).expect("install");
    core.uninstall(as_owner(), tools).expect("uninstall");
    assert!(matches!(
        core.call_entrypoint(CallEnv::new(alice()), selector, &[]),
        Err(CoreError::EntrypointNotFound(_))
    ));
}

#[test]
fn entrypoint_selector_has_one_owner() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let core = open_core(&conn, &host, CoreVariant::Fungible);
    let first = deploy(&host, "ext.first", Scripted::new("first").exposes(ECHO, false));
    let second = deploy(&host, "ext.second", Scripted::new("second").exposes(ECHO, false));
    core.install(as_owner(), first, &[]).expect("install first");

    assert!(matches!(
        core.install(as_owner(), second, &[]),
        Err(CoreError::EntrypointOccupied { handler, .. }) if handler == first
    ));
    assert!(core.installed(&second).expect("lookup").is_none());
}

#[test]
fn entrypoint_value_moves_to_handler_and_reverts_restore_it() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let core = open_core(&conn, &host, CoreVariant::Fungible);
    let tools = deploy(&host, "ext.tools", Scripted::new("tools").exposes(ECHO, false));
    let broken = deploy(
        &host,
        "ext.broken",
        Scripted::new("broken")
            .exposes(WHOAMI, false)
            .reverting("entrypoint disabled"),
    );
    core.install(as_owner(), tools, &[]).expect("install tools");
    core.install(as_owner(), broken, &[]).expect("install broken");
    core.credit_native(&alice(), 20).expect("fund alice");

    core.call_entrypoint(
        CallEnv::new(alice()).with_value(5),
        Selector::from_signature(ECHO),
        &[],
    )
    .expect("paid call");
    assert_eq!(core.native_balance_of(&alice()).expect("native"), 15);
    assert_eq!(core.native_balance_of(&tools).expect("native"), 5);
    assert_eq!(value_seen(&core, tools), 5);

    let err = core
        .call_entrypoint(
            CallEnv::new(alice()).with_value(5),
            Selector::from_signature(WHOAMI),
            &[],
        )
        .expect_err("handler reverts");
    assert_eq!(err.revert_reason(), Some("entrypoint disabled"));
    assert_eq!(core.native_balance_of(&alice()).expect("native"), 15);
    assert_eq!(core.native_balance_of(&broken).expect("native"), 0);
}
