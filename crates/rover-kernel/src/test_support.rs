//! Recording mock capabilities for supervisor tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rover_hal::{Drive, ObstacleSensor, PoseSource, RoutePlanner};
use rover_types::{Point2, Pose, Route, RoverError, Waypoint};
use tokio::sync::watch;

use crate::supervisor::Capabilities;

/// A drive whose motions run until stopped, and whose routes take a fixed
/// time per call and end exactly on the last waypoint.
pub struct MockDrive {
    pose: Arc<Mutex<Pose>>,
    moving: Arc<watch::Sender<bool>>,
    pub motion_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    pub routes: Mutex<Vec<Route>>,
    /// Motion starts fail with a hardware fault.
    pub fail_motion: AtomicBool,
    /// `stop` is ignored and `wait_for_stop` never resolves.
    pub hang: AtomicBool,
    pub leg_time: Duration,
}

impl MockDrive {
    pub fn new() -> Self {
        Self {
            pose: Arc::new(Mutex::new(Pose::new(20.0, 20.0, 0.0))),
            moving: Arc::new(watch::channel(false).0),
            motion_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            routes: Mutex::new(Vec::new()),
            fail_motion: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            leg_time: Duration::from_millis(30),
        }
    }

    pub fn is_moving(&self) -> bool {
        *self.moving.borrow()
    }

    pub fn motion_calls(&self) -> u32 {
        self.motion_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    fn start_motion(&self) -> Result<(), RoverError> {
        if self.fail_motion.load(Ordering::SeqCst) {
            return Err(RoverError::HardwareFault {
                component: "mock_drive".into(),
                details: "motor controller offline".into(),
            });
        }
        self.motion_calls.fetch_add(1, Ordering::SeqCst);
        self.moving.send_replace(true);
        Ok(())
    }
}

impl PoseSource for MockDrive {
    fn current_pose(&self) -> Pose {
        *self.pose.lock()
    }
}

#[async_trait]
impl Drive for MockDrive {
    async fn forward(&self) -> Result<(), RoverError> {
        self.start_motion()
    }

    async fn backward(&self) -> Result<(), RoverError> {
        self.start_motion()
    }

    async fn turn_left(&self) -> Result<(), RoverError> {
        self.start_motion()
    }

    async fn turn_right(&self) -> Result<(), RoverError> {
        self.start_motion()
    }

    async fn follow_route(&self, route: &Route) -> Result<(), RoverError> {
        self.start_motion()?;
        self.routes.lock().push(route.clone());

        let end = route.waypoints().last().map(Waypoint::point);
        let pose = Arc::clone(&self.pose);
        let moving = Arc::clone(&self.moving);
        let leg_time = self.leg_time;
        tokio::spawn(async move {
            tokio::time::sleep(leg_time).await;
            if let Some(Point2 { x, y }) = end {
                let mut p = pose.lock();
                p.x = x;
                p.y = y;
            }
            moving.send_replace(false);
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), RoverError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !self.hang.load(Ordering::SeqCst) {
            self.moving.send_replace(false);
        }
        Ok(())
    }

    async fn wait_for_stop(&self) -> Result<(), RoverError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut rx = self.moving.subscribe();
        rx.wait_for(|m| !*m)
            .await
            .map(|_| ())
            .map_err(|_| RoverError::HardwareFault {
                component: "mock_drive".into(),
                details: "closed".into(),
            })
    }
}

/// An obstacle sensor flipped by the test.
#[derive(Default)]
pub struct MockObstacles {
    pub blocked: AtomicBool,
    pub polls: AtomicU32,
}

impl ObstacleSensor for MockObstacles {
    fn is_obstacle_ahead(&self) -> Result<bool, RoverError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blocked.load(Ordering::SeqCst))
    }
}

/// Records every request and answers with a one-hop route.
#[derive(Default)]
pub struct MockPlanner {
    pub requests: Mutex<Vec<(Pose, Waypoint)>>,
    pub fail: AtomicBool,
}

impl RoutePlanner for MockPlanner {
    fn plan(&self, from: Pose, to: &Waypoint) -> Result<Route, RoverError> {
        self.requests.lock().push((from, *to));
        if self.fail.load(Ordering::SeqCst) {
            return Err(RoverError::NoRoute {
                from: from.location(),
                to: to.point(),
            });
        }
        Ok(Route::new(vec![*to]))
    }
}

pub struct Mocks {
    pub drive: Arc<MockDrive>,
    pub obstacles: Arc<MockObstacles>,
    pub planner: Arc<MockPlanner>,
}

impl Mocks {
    pub fn new() -> Self {
        Self {
            drive: Arc::new(MockDrive::new()),
            obstacles: Arc::new(MockObstacles::default()),
            planner: Arc::new(MockPlanner::default()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            drive: self.drive.clone(),
            obstacles: self.obstacles.clone(),
            route_obstacles: self.obstacles.clone(),
            planner: self.planner.clone(),
        }
    }
}
