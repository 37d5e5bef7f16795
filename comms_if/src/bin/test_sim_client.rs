//! Simple simulator client test
//!
//! Connects to a running controller in place of the simulator, sends telemetry for a vehicle
//! driving along a straight or gently curving road, and prints the replies.

use comms_if::{
    net::tungstenite::{self, Message},
    sim::{Telemetry, MANUAL_ACK},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_sim_client", about = "Send canned telemetry to the MPC exec")]
struct Opt {
    /// WebSocket URL of the controller
    #[structopt(long, default_value = "ws://localhost:4567/socket.io/")]
    url: String,

    /// Number of telemetry frames to send
    #[structopt(short, long, default_value = "10")]
    num_frames: usize,

    /// Vehicle speed reported in the telemetry
    #[structopt(short, long, default_value = "20.0")]
    speed: f64,

    /// Curvature of the road ahead, zero for a straight road
    #[structopt(short, long, default_value = "0.0")]
    curvature: f64,

    /// Send a manual mode frame first
    #[structopt(long)]
    manual_first: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let (mut socket, _) = match tungstenite::connect(opt.url.as_str()) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the controller at {}", opt.url);
            return Err(e.into())
        }
    };

    if opt.manual_first {
        socket.send(Message::Text("42[\"manual\",null]".into()))?;
        match socket.read()? {
            Message::Text(r) if r == MANUAL_ACK => println!("manual acknowledged"),
            m => println!("unexpected reply to manual frame: {:?}", m),
        }
    }

    for i in 0..opt.num_frames {
        // Waypoints ahead of the vehicle, which sits at the origin facing +X
        let ptsx: Vec<f64> = (0..6).map(|k| 10.0 * k as f64).collect();
        let ptsy: Vec<f64> = ptsx.iter().map(|x| 0.5 * opt.curvature * x * x).collect();

        let telemetry = Telemetry {
            ptsx,
            ptsy,
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            speed: opt.speed,
            steering_angle: 0.0,
            throttle: 0.0,
        };

        print!("Sending frame {}... ", i);
        socket.send(Message::Text(telemetry.to_payload()?))?;

        match socket.read()? {
            Message::Text(r) => println!("response: {}", r),
            m => println!("non-text response: {:?}", m),
        }
    }

    socket.close(None)?;

    Ok(())
}
