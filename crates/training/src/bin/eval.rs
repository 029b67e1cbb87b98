use clap::Parser;
use training::util::{init_logging, run_eval, EvalArgs};
use vision_core::Finger;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = EvalArgs::parse();
    let threshold = args.pck_threshold;
    let report = run_eval(args)?;
    let kp = &report.keypoints;

    println!(
        "Eval complete: samples={}, batches={}, iou_loss={:.5}, mean_error={:.3}px, pck@{}px={:.3}",
        kp.samples(),
        report.batches,
        report.mean_loss,
        kp.mean_error(),
        threshold,
        kp.pck()
    );
    println!("  wrist: {:.3}px", kp.joint_error(0));
    for finger in Finger::ALL {
        println!("  {}: {:.3}px", finger.name(), kp.finger_error(finger));
    }
    Ok(())
}
