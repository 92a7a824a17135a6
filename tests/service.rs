mod common;

use std::sync::Arc;

use tokio::sync::RwLock;

use common::*;
use hege_region::ErrorKind;
use hege_region::auth::{Character, StaticAuthenticator, User};
use hege_region::model::*;
use hege_region::service::{Caller, OrderAck, Service, ServiceConfig};

const OWNER: Caller = Caller { user: 1, character: 11 };
const NEIGHBOUR: Caller = Caller { user: 2, character: 22 };
const ABROAD: Caller = Caller { user: 3, character: 33 };
const SUSPENDED: Caller = Caller { user: 4, character: 44 };

// -- helpers --

fn user(id: u64, character: u64, region: &str, suspended: bool) -> User {
    User {
        id,
        name: format!("user{id}"),
        characters: vec![Character {
            id: character,
            region: region.to_string(),
            name: format!("char{character}"),
            off: false,
            deleted: false,
        }],
        suspended,
        deleted: false,
    }
}

fn definitions() -> Definitions {
    let mut defs = Definitions::default();
    for id in 1..=3 {
        defs.units.add(UnitType {
            id,
            name: format!("unit{id}"),
            health: 2,
            ..UnitType::default()
        });
    }
    defs
}

fn service_with(config: ServiceConfig) -> Service {
    let mut tw = build_test_world(definitions());
    tw.city_mut(A).owner = OWNER.character;
    tw.city_mut(B).owner = NEIGHBOUR.character;
    let auth = StaticAuthenticator::new([
        user(1, 11, REGION, false),
        user(2, 22, REGION, false),
        user(3, 33, "elsewhere", false),
        user(4, 44, REGION, true),
    ]);
    Service::new(Arc::new(RwLock::new(tw.world)), Arc::new(auth), config)
}

fn service() -> Service {
    service_with(ServiceConfig::default())
}

async fn raise_army(svc: &Service) -> String {
    let unit = svc.train(OWNER, REGION, A, 1).await.unwrap();
    svc.create_army(OWNER, REGION, A, "guard", &[unit]).await.unwrap()
}

// -- cities --

#[tokio::test]
async fn owners_see_everything_others_the_public_view() {
    let svc = service();

    let mine = svc.show_city(OWNER, REGION, A).await.unwrap();
    assert!(mine.detail.is_some());
    assert!(mine.politics.is_some());

    let theirs = svc.show_city(NEIGHBOUR, REGION, A).await.unwrap();
    assert_eq!(theirs.name, "A");
    assert!(theirs.detail.is_none());
    assert!(theirs.tax_rate.is_none());

    let listed: Vec<u64> = svc
        .list_cities(OWNER, REGION, 0, 0)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed, vec![A]);
}

#[tokio::test]
async fn access_is_checked_before_anything_changes() {
    let svc = service();

    let err = svc.train(NEIGHBOUR, REGION, A, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = svc.train(SUSPENDED, REGION, A, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = svc.show_city(ABROAD, REGION, A).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = svc.list_cities(Caller::new(9, 99), REGION, 0, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let world = svc.world().read().await;
    assert!(world.region(REGION).unwrap().city(A).unwrap().units.is_empty());
}

#[tokio::test]
async fn train_raise_and_march() {
    let svc = service();
    let army = raise_army(&svc).await;

    let armies = svc.list_armies(OWNER, REGION, A, "", 0).await.unwrap();
    assert_eq!(armies.len(), 1);
    assert_eq!(armies[0].units.len(), 1);

    let ack = svc
        .move_to(OWNER, REGION, A, &army, C, MoveArgs::default())
        .await
        .unwrap();
    assert_eq!(
        ack,
        OrderAck {
            queued: 1,
            in_fight: false
        }
    );

    svc.move_armies(REGION).await.unwrap();
    svc.move_armies(REGION).await.unwrap();
    let view = svc.show_army(OWNER, REGION, A, &army).await.unwrap();
    assert_eq!(view.cell, C);
    assert!(view.commands.is_empty());

    let err = svc.show_army(NEIGHBOUR, REGION, A, &army).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

// -- armies --

#[tokio::test]
async fn orders_to_a_fighting_army_are_queued_and_flagged() {
    let svc = service();
    {
        let mut world = svc.world().write().await;
        let b = world.region_mut(REGION).unwrap().city_mut(B).unwrap();
        b.units.add(finished_unit(1));
    }
    let army = raise_army(&svc).await;
    svc.attack(OWNER, REGION, A, &army, B, AssaultArgs::default())
        .await
        .unwrap();
    svc.move_armies(REGION).await.unwrap();

    let ack = svc.wait_at(OWNER, REGION, A, &army, A).await.unwrap();
    assert_eq!(
        ack,
        OrderAck {
            queued: 1,
            in_fight: true
        }
    );
    let view = svc.show_army(OWNER, REGION, A, &army).await.unwrap();
    assert!(view.fight.is_some());

    svc.flea(OWNER, REGION, A, &army).await.unwrap();
    let view = svc.show_army(OWNER, REGION, A, &army).await.unwrap();
    assert!(view.fight.is_none());
    let regions = svc.list_regions("", 0).await.unwrap();
    assert_eq!(regions[0].fights, 0);

    let err = svc.flea(OWNER, REGION, A, &army).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn bad_orders_are_refused() {
    let svc = service();
    let army = raise_army(&svc).await;

    let err = svc.wait_at(OWNER, REGION, A, &army, 99).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = svc
        .order_json(OWNER, REGION, A, &army, B, "charge", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = svc
        .order_json(OWNER, REGION, A, &army, B, "move", Some("{not json"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let ack = svc
        .order_json(OWNER, REGION, A, &army, B, "attack", Some(r#"{"massacre": true}"#))
        .await
        .unwrap();
    assert_eq!(ack.queued, 1);
    svc.cancel(OWNER, REGION, A, &army).await.unwrap();
    assert!(svc
        .show_army(OWNER, REGION, A, &army)
        .await
        .unwrap()
        .commands
        .is_empty());

    svc.world()
        .write()
        .await
        .region_mut(REGION)
        .unwrap()
        .city_mut(A)
        .unwrap()
        .auto = true;
    let err = svc.defend(OWNER, REGION, A, &army, A).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn transfers_between_city_and_docked_army() {
    let svc = service();
    svc.world()
        .write()
        .await
        .region_mut(REGION)
        .unwrap()
        .city_mut(A)
        .unwrap()
        .stock = Resources::of(ResourceKind::Stone, 10);
    let army = raise_army(&svc).await;
    let extra = svc.train(OWNER, REGION, A, 2).await.unwrap();

    assert_eq!(
        svc.transfer_units(OWNER, REGION, A, &army, &[extra.clone()])
            .await
            .unwrap(),
        1
    );
    svc.transfer_resources(OWNER, REGION, A, &army, Resources::of(ResourceKind::Stone, 4))
        .await
        .unwrap();
    let err = svc
        .transfer_resources(OWNER, REGION, A, &army, Resources::of(ResourceKind::Stone, 7))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let view = svc.show_army(OWNER, REGION, A, &army).await.unwrap();
    assert_eq!(view.units.len(), 2);
    assert_eq!(view.stock, Resources::of(ResourceKind::Stone, 4));

    svc.return_units(OWNER, REGION, A, &army, &[extra]).await.unwrap();
    svc.return_resources(OWNER, REGION, A, &army, Resources::of(ResourceKind::Stone, 4))
        .await
        .unwrap();
    let world = svc.world().read().await;
    let city = world.region(REGION).unwrap().city(A).unwrap();
    assert_eq!(city.stock, Resources::of(ResourceKind::Stone, 10));
    assert_eq!(city.units.len(), 1);
}

// -- admin and definitions --

#[tokio::test]
async fn admin_manages_regions() {
    let svc = service();

    let created = svc.create_region("second", MAP).await.unwrap();
    assert_eq!(created.cities, 3);
    let err = svc.create_region("second", MAP).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    let err = svc.create_region("third", "nowhere").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let names: Vec<String> = svc
        .list_regions("", 0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["second".to_string(), REGION.to_string()]);
    assert_eq!(svc.list_regions("second", 0).await.unwrap().len(), 1);

    svc.produce(REGION).await.unwrap();
    let scores = svc.scores(REGION).await.unwrap();
    assert_eq!(scores.iter().map(|s| s.city).collect::<Vec<_>>(), vec![A, B, C]);
    svc.check().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(svc.save(dir.path()).await.unwrap(), 2);
    assert!(dir.path().join("second.json").exists());
}

#[tokio::test]
async fn definitions_are_paged() {
    let svc = service_with(ServiceConfig {
        page_size: 2,
        ..ServiceConfig::default()
    });

    let first: Vec<u64> = svc.list_units(0, 0).await.unwrap().iter().map(|u| u.id).collect();
    assert_eq!(first, vec![1, 2]);
    let rest: Vec<u64> = svc.list_units(2, 10).await.unwrap().iter().map(|u| u.id).collect();
    assert_eq!(rest, vec![3]);
    assert!(svc.list_buildings(0, 0).await.unwrap().is_empty());
    assert!(svc.list_knowledges(0, 0).await.unwrap().is_empty());
}
