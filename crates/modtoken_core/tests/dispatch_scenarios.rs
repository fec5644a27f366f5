mod common;

use common::{alice, as_owner, bob, calls, deploy, open_core, value_seen, Scripted};
use modtoken_core::model::event::{
    BEFORE_APPROVE_ERC20, BEFORE_BURN_ERC20, BEFORE_MINT_ERC20, BEFORE_MINT_ERC721,
    BEFORE_TRANSFER_ERC20, ON_TOKEN_URI, ROYALTY_INFO,
};
use modtoken_core::{
    open_db_in_memory, Address, CallEnv, CoreError, CoreVariant, ExtensionHost, FungibleToken,
    HandlerMode, HookOutput, MintDirective, NonFungibleToken, Selector,
};

#[test]
fn required_mint_hook_gates_minting() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let minter = deploy(
        &host,
        "ext.mint",
        Scripted::new("mint.open").handles(BEFORE_MINT_ERC20, HandlerMode::Required),
    );

    let err = token
        .mint(CallEnv::new(alice()), alice(), 5, &[])
        .expect_err("no mint handler");
    assert!(matches!(
        err,
        CoreError::RequiredHookMissing(event) if event == Selector::from_signature(BEFORE_MINT_ERC20)
    ));

    token.core().install(as_owner(), minter, &[]).expect("install");
    let minted = token
        .mint(CallEnv::new(alice()), alice(), 5, &[])
        .expect("mint through extension");
    assert_eq!(minted, 5);
    assert_eq!(calls(token.core(), minter), 1);
    assert_eq!(token.balance_of(&alice()).expect("balance"), 5);

    token.core().uninstall(as_owner(), minter).expect("uninstall");
    assert!(matches!(
        token.mint(CallEnv::new(alice()), alice(), 5, &[]),
        Err(CoreError::RequiredHookMissing(_))
    ));
    assert_eq!(token.total_supply().expect("supply"), 5);
}

#[test]
fn transfer_slot_moves_between_extensions_only_through_uninstall() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let a = deploy(
        &host,
        "ext.a",
        Scripted::new("a").handles(BEFORE_TRANSFER_ERC20, HandlerMode::Optional),
    );
    let b = deploy(
        &host,
        "ext.b",
        Scripted::new("b").handles(BEFORE_TRANSFER_ERC20, HandlerMode::Optional),
    );
    token.core().install(as_owner(), a, &[]).expect("install a");

    assert!(matches!(
        token.core().install(as_owner(), b, &[]),
        Err(CoreError::EventSlotOccupied { handler, .. }) if handler == a
    ));

    token.core().uninstall(as_owner(), a).expect("uninstall a");
    token.core().install(as_owner(), b, &[]).expect("install b");
    token
        .transfer(CallEnv::new(alice()), bob(), 0)
        .expect("zero transfer routes to b");
    assert_eq!(calls(token.core(), a), 0);
    assert_eq!(calls(token.core(), b), 1);
}

#[test]
fn optional_approve_without_handler_makes_no_call() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let unrelated = deploy(
        &host,
        "ext.mint",
        Scripted::new("mint").handles(BEFORE_MINT_ERC20, HandlerMode::Required),
    );
    token.core().install(as_owner(), unrelated, &[]).expect("install");

    token
        .approve(CallEnv::new(alice()), bob(), 42)
        .expect("approve without handler");
    assert_eq!(token.allowance(&alice(), &bob()).expect("allowance"), 42);
    assert_eq!(calls(token.core(), unrelated), 0);
}

#[test]
fn burn_revert_reason_reaches_caller_verbatim() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let minter = deploy(
        &host,
        "ext.mint",
        Scripted::new("mint").handles(BEFORE_MINT_ERC20, HandlerMode::Required),
    );
    let burner = deploy(
        &host,
        "ext.burn",
        Scripted::new("burn.gate")
            .handles(BEFORE_BURN_ERC20, HandlerMode::Optional)
            .reverting("insufficient eligibility"),
    );
    token.core().install(as_owner(), minter, &[]).expect("install minter");
    token.core().install(as_owner(), burner, &[]).expect("install burner");
    token
        .mint(CallEnv::new(alice()), alice(), 10, &[])
        .expect("mint");

    let err = token
        .burn(CallEnv::new(alice()), alice(), 4, &[])
        .expect_err("burn reverts");
    assert!(matches!(
        &err,
        CoreError::HandlerCallFailed { handler, .. } if *handler == burner
    ));
    assert_eq!(err.revert_reason(), Some("insufficient eligibility"));
    assert_eq!(err.to_string(), "insufficient eligibility");
    assert_eq!(token.balance_of(&alice()).expect("balance"), 10);
    assert_eq!(token.total_supply().expect("supply"), 10);
    // The revert also undid the handler's own bookkeeping.
    assert_eq!(calls(token.core(), burner), 0);
}

#[test]
fn value_is_forwarded_to_payable_handlers_only() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let minter = deploy(
        &host,
        "ext.mint",
        Scripted::new("mint.paid").handles(BEFORE_MINT_ERC20, HandlerMode::Required),
    );
    let core = token.core();
    core.credit_native(&alice(), 100).expect("fund alice");

    assert!(matches!(
        token.mint(CallEnv::new(alice()).with_value(30), alice(), 1, &[]),
        Err(CoreError::RequiredHookMissing(_))
    ));
    assert_eq!(core.native_balance_of(&alice()).expect("native"), 100);

    core.install(as_owner(), minter, &[]).expect("install");
    token
        .mint(CallEnv::new(alice()).with_value(30), alice(), 1, &[])
        .expect("paid mint");
    assert_eq!(core.native_balance_of(&alice()).expect("native"), 70);
    assert_eq!(core.native_balance_of(&minter).expect("native"), 30);
    assert_eq!(core.native_balance_of(&core.address()).expect("native"), 0);
    assert_eq!(value_seen(core, minter), 30);

    let err = token
        .transfer(CallEnv::new(alice()).with_value(1), bob(), 1)
        .expect_err("transfer is not payable");
    assert!(matches!(
        err,
        CoreError::NonPayableEvent(event) if event == Selector::from_signature(BEFORE_TRANSFER_ERC20)
    ));

    assert!(matches!(
        token.mint(CallEnv::new(bob()).with_value(5), bob(), 1, &[]),
        Err(CoreError::InsufficientNativeBalance { needed: 5, available: 0, .. })
    ));
}

#[test]
fn mint_handler_can_override_quantity() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let capped = deploy(
        &host,
        "ext.cap",
        Scripted::new("mint.cap")
            .handles(BEFORE_MINT_ERC20, HandlerMode::Required)
            .returning(HookOutput::Mint(MintDirective {
                token_id: None,
                quantity: Some(3),
            })),
    );
    token.core().install(as_owner(), capped, &[]).expect("install");

    let minted = token
        .mint(CallEnv::new(alice()), alice(), 100, &[])
        .expect("mint");
    assert_eq!(minted, 3);
    assert_eq!(token.balance_of(&alice()).expect("balance"), 3);
}

#[test]
fn malformed_handler_result_fails_operation() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let token = FungibleToken::new(open_core(&conn, &host, CoreVariant::Fungible))
        .expect("fungible token");
    let odd = deploy(
        &host,
        "ext.odd",
        Scripted::new("odd")
            .handles(BEFORE_APPROVE_ERC20, HandlerMode::Optional)
            .returning(HookOutput::TokenUri {
                uri: "ipfs://nope".to_string(),
            }),
    );
    token.core().install(as_owner(), odd, &[]).expect("install");

    assert!(matches!(
        token.approve(CallEnv::new(alice()), bob(), 1),
        Err(CoreError::MalformedHandlerResult { handler, .. }) if handler == odd
    ));
    assert_eq!(token.allowance(&alice(), &bob()).expect("allowance"), 0);
}

#[test]
fn view_events_resolve_without_side_effects() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let nft = NonFungibleToken::new(open_core(&conn, &host, CoreVariant::NonFungible))
        .expect("nft token");
    let minter = deploy(
        &host,
        "ext.mint721",
        Scripted::new("mint.open").handles(BEFORE_MINT_ERC721, HandlerMode::Required),
    );
    let metadata = deploy(
        &host,
        "ext.uri",
        Scripted::new("uri.static")
            .handles(ON_TOKEN_URI, HandlerMode::Required)
            .returning(HookOutput::TokenUri {
                uri: "ipfs://collection/0".to_string(),
            }),
    );
    nft.core().install(as_owner(), minter, &[]).expect("install minter");
    nft.mint(CallEnv::new(alice()), alice(), 1, &[]).expect("mint");

    assert!(matches!(
        nft.token_uri(0),
        Err(CoreError::RequiredHookMissing(_))
    ));
    nft.core().install(as_owner(), metadata, &[]).expect("install uri");
    assert_eq!(nft.token_uri(0).expect("uri"), "ipfs://collection/0");
    assert_eq!(calls(nft.core(), metadata), 0);

    assert_eq!(
        nft.royalty_info(0, 1_000).expect("royalty"),
        (Address::ZERO, 0)
    );
}

#[test]
fn view_handlers_cannot_write_state() {
    let conn = open_db_in_memory().expect("open db");
    let host = ExtensionHost::new();
    let nft = NonFungibleToken::new(open_core(&conn, &host, CoreVariant::NonFungible))
        .expect("nft token");
    let artist = Address::derive("artist");
    let royalty = deploy(
        &host,
        "ext.royalty",
        Scripted::new("royalty.flat")
            .handles(ROYALTY_INFO, HandlerMode::Optional)
            .returning(HookOutput::Royalty {
                receiver: artist,
                amount: 50,
            }),
    );
    let writer = deploy(
        &host,
        "ext.writer",
        Scripted::new("uri.writer")
            .handles(ON_TOKEN_URI, HandlerMode::Required)
            .writing_in_views()
            .returning(HookOutput::TokenUri {
                uri: "ipfs://x".to_string(),
            }),
    );
    nft.core().install(as_owner(), royalty, &[]).expect("install royalty");
    nft.core().install(as_owner(), writer, &[]).expect("install writer");

    assert_eq!(nft.royalty_info(7, 1_000).expect("royalty"), (artist, 50));

    let minter = deploy(
        &host,
        "ext.mint721",
        Scripted::new("mint.open").handles(BEFORE_MINT_ERC721, HandlerMode::Required),
    );
    nft.core().install(as_owner(), minter, &[]).expect("install minter");
    nft.mint(CallEnv::new(alice()), alice(), 1, &[]).expect("mint");

    let err = nft.token_uri(0).expect_err("view write rejected");
    assert_eq!(err.revert_reason(), Some("state is read-only in view calls"));
    assert_eq!(
        nft.core()
            .extension_state(&writer, b"scratch")
            .expect("state"),
        None
    );
}
