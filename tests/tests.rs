use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_legwork::math::*;
use bevy_legwork::prelude::*;
use bevy_legwork::{
    LegworkFootSensor, LegworkGroundHit, LegworkGroundSensor, LegworkMotor, LegworkProbe,
    LegworkStepPlannerState,
};

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)));
    app.add_plugins(LegworkPlugin::default());
    app
}

fn ground_hit(point: Vector3, distance: Float) -> LegworkGroundHit {
    LegworkGroundHit {
        entity: Entity::PLACEHOLDER,
        point,
        normal: Dir3::Y,
        distance,
    }
}

fn spawn_leg(app: &mut App, position: Vec3) -> LegworkLeg {
    let anchor = app
        .world_mut()
        .spawn((
            Transform::from_translation(position),
            GlobalTransform::from_translation(position),
        ))
        .id();
    let ik_target = app
        .world_mut()
        .spawn(Transform::from_translation(position))
        .id();
    LegworkLeg {
        smooth_time: 0.2,
        step_height: 0.3,
        ..LegworkLeg::new(anchor, ik_target)
    }
}

/// A character whose foot probe hits the ground at `ground`, as a physics backend would report.
fn spawn_stepper(app: &mut App, legs: Vec<LegworkLeg>, ground: Option<Vector3>) -> Entity {
    app.world_mut()
        .spawn((
            LegworkStepPlanner {
                legs,
                ..Default::default()
            },
            LegworkFootSensor(LegworkProbe {
                output: ground.map(|point| ground_hit(point, 1.0)),
                ..Default::default()
            }),
        ))
        .id()
}

fn position_of(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

fn state_of(app: &App, entity: Entity) -> &LegworkStepPlannerState {
    app.world().get::<LegworkStepPlannerState>(entity).unwrap()
}

#[test]
fn foot_steps_to_far_ground_and_lands() {
    let mut app = app();
    let leg = spawn_leg(&mut app, Vec3::ZERO);
    let ik_target = leg.ik_target;
    let character = spawn_stepper(&mut app, vec![leg], Some(Vector3::new(0.6, 0.0, 0.0)));

    let mut highest: f32 = 0.0;
    for _ in 0..10 {
        app.update();
        highest = highest.max(position_of(&app, ik_target).y);
    }
    assert!(state_of(&app, character).is_leg_busy(0));
    assert!(0.0 < highest);

    for _ in 0..20 {
        app.update();
    }
    assert!(!state_of(&app, character).any_busy());
    assert_eq!(position_of(&app, ik_target), Vec3::new(0.6, 0.0, 0.0));
}

#[test]
fn foot_stays_when_ground_is_within_bound() {
    let mut app = app();
    let leg = spawn_leg(&mut app, Vec3::ZERO);
    let ik_target = leg.ik_target;
    let character = spawn_stepper(&mut app, vec![leg], Some(Vector3::new(0.05, 0.0, 0.0)));

    for _ in 0..30 {
        app.update();
        assert!(!state_of(&app, character).any_busy());
    }
    assert_eq!(position_of(&app, ik_target), Vec3::ZERO);
}

#[test]
fn foot_stays_without_ground() {
    let mut app = app();
    let leg = spawn_leg(&mut app, Vec3::ZERO);
    let ik_target = leg.ik_target;
    let character = spawn_stepper(&mut app, vec![leg], None);

    for _ in 0..30 {
        app.update();
    }
    assert!(!state_of(&app, character).any_busy());
    assert_eq!(state_of(&app, character).armed_leg(), 0);
    assert_eq!(position_of(&app, ik_target), Vec3::ZERO);
}

#[test]
fn disabling_cancels_steps_in_flight() {
    let mut app = app();
    let leg = spawn_leg(&mut app, Vec3::ZERO);
    let ik_target = leg.ik_target;
    let character = spawn_stepper(&mut app, vec![leg], Some(Vector3::new(2.0, 0.0, 0.0)));

    for _ in 0..5 {
        app.update();
    }
    assert!(state_of(&app, character).any_busy());

    app.world_mut()
        .entity_mut(character)
        .insert(LegworkToggle::Disabled);
    app.update();
    assert!(!state_of(&app, character).any_busy());
    let stopped_at = position_of(&app, ik_target);
    assert!(0.0 < stopped_at.x && stopped_at.x < 2.0);

    for _ in 0..30 {
        app.update();
    }
    assert_eq!(position_of(&app, ik_target), stopped_at);
}

#[test]
fn body_levels_over_the_support_triangle() {
    let mut app = app();
    let legs = vec![
        spawn_leg(&mut app, Vec3::new(-1.0, 1.0, -1.0)),
        spawn_leg(&mut app, Vec3::new(1.0, 1.0, -1.0)),
        spawn_leg(&mut app, Vec3::new(0.0, 0.0, 1.0)),
    ];
    let body = app.world_mut().spawn(Transform::default()).id();
    let character = spawn_stepper(&mut app, legs, None);
    app.world_mut()
        .entity_mut(character)
        .insert(LegworkBodyOrientation {
            position_smooth: 1000.0,
            rotation_smooth: 1000.0,
            ..LegworkBodyOrientation::new(body)
        });

    for _ in 0..5 {
        app.update();
    }
    let transform = app.world().get::<Transform>(body).unwrap();
    assert!(transform
        .translation
        .abs_diff_eq(Vec3::new(0.0, 2.0 / 3.0, -1.0 / 3.0), 1e-5));
    let expected_up = Vec3::new(0.0, 2.0, 1.0).normalize();
    assert!((transform.rotation * Vec3::Y).abs_diff_eq(expected_up, 1e-5));
    assert!((transform.rotation * Vec3::X).abs_diff_eq(Vec3::X, 1e-5));
}

#[test]
fn body_stays_put_with_two_legs() {
    let mut app = app();
    let legs = vec![
        spawn_leg(&mut app, Vec3::new(-1.0, 1.0, -1.0)),
        spawn_leg(&mut app, Vec3::new(1.0, 0.0, 1.0)),
    ];
    let initial = Transform::from_xyz(3.0, 4.0, 5.0).with_rotation(Quat::from_rotation_y(0.5));
    let body = app.world_mut().spawn(initial).id();
    let character = spawn_stepper(&mut app, legs, None);
    app.world_mut()
        .entity_mut(character)
        .insert(LegworkBodyOrientation {
            position_smooth: 1000.0,
            rotation_smooth: 1000.0,
            ..LegworkBodyOrientation::new(body)
        });

    for _ in 0..10 {
        app.update();
    }
    assert_eq!(*app.world().get::<Transform>(body).unwrap(), initial);
}

#[test]
fn controller_floats_and_moves_relative_to_camera() {
    let mut app = app();
    app.world_mut()
        .spawn((LegworkCamera, GlobalTransform::IDENTITY));
    let character = app
        .world_mut()
        .spawn((
            LegworkController::default(),
            LegworkMoveInput(Vector2::Y),
            LegworkGroundSensor(LegworkProbe {
                output: Some(ground_hit(Vector3::ZERO, 0.1)),
                ..Default::default()
            }),
        ))
        .id();

    for _ in 0..10 {
        app.update();
    }
    let motor = app.world().get::<LegworkMotor>(character).unwrap();
    assert!(motor
        .force
        .abs_diff_eq(Vector3::new(0.0, 0.5, -1.0), 1e-5));
    assert!(motor.desired_rotation.is_some());
    assert_eq!(motor.max_speed, Some(5.0));
    // The backend caps the body's velocity through the motor.
    assert!(motor
        .clamp_velocity(Vector3::new(0.0, 0.0, -20.0))
        .abs_diff_eq(Vector3::new(0.0, 0.0, -5.0), 1e-5));

    let sensor = app.world().get::<LegworkGroundSensor>(character).unwrap();
    assert!(sensor.0.is_active());
}

#[test]
fn controller_without_camera_still_floats() {
    let mut app = app();
    let character = app
        .world_mut()
        .spawn((
            LegworkController::default(),
            LegworkMoveInput(Vector2::Y),
            LegworkGroundSensor(LegworkProbe {
                output: None,
                ..Default::default()
            }),
        ))
        .id();

    for _ in 0..10 {
        app.update();
    }
    let motor = app.world().get::<LegworkMotor>(character).unwrap();
    assert_eq!(motor.force, Vector3::new(0.0, -10.0, 0.0));
    assert_eq!(motor.desired_rotation, None);
}

#[cfg(feature = "serialize")]
#[test]
fn configuration_survives_ron() {
    let planner = LegworkStepPlanner {
        update_mode: LegworkUpdateMode::Sequential,
        step_distance_ratio: 1.25,
        legs: vec![LegworkLeg {
            step_height: 0.4,
            ..LegworkLeg::new(Entity::PLACEHOLDER, Entity::PLACEHOLDER)
        }],
        ..Default::default()
    };
    let controller = LegworkController {
        float_height: 0.35,
        ..Default::default()
    };

    let serialized = ron::to_string(&(planner, controller)).expect("Unable to serialize");
    let (planner, controller): (LegworkStepPlanner, LegworkController) =
        ron::from_str(&serialized).expect(&format!("Could not deserialize {serialized}"));

    assert_eq!(planner.step_distance_ratio, 1.25);
    assert_eq!(planner.legs.len(), 1);
    assert_eq!(planner.legs[0].step_height, 0.4);
    assert_eq!(controller.float_height, 0.35);
}
