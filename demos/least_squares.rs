// Fits a straight line through noisy points with a rank-revealing least-squares solve,
// then shows what happens when the design matrix has a duplicated column.
//
//     cargo run --example least_squares

use ndarray::{Array1, Array2};
use svd_factor::{FactorSvd, FactorSvdConfig, InversePolicy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let xs = Array1::linspace(0.0, 9.0, 10);
    // y = 2x + 1 with a small alternating perturbation.
    let ys = xs.mapv(|x: f64| 2.0 * x + 1.0 + if (x as usize) % 2 == 0 { 0.05 } else { -0.05 });

    let mut design = Array2::<f64>::ones((xs.len(), 2));
    design.column_mut(0).assign(&xs);

    let mut svd = FactorSvd::from_matrix(&design)?;
    let coefficients = svd.solve(&ys)?;
    println!("rank = {}", svd.rank()?);
    println!("slope = {:.4}, intercept = {:.4}", coefficients[0], coefficients[1]);

    // Duplicating the slope column makes the problem rank deficient. The
    // minimum-norm solution splits the slope evenly across both copies.
    let mut redundant = Array2::<f64>::ones((xs.len(), 3));
    redundant.column_mut(0).assign(&xs);
    redundant.column_mut(1).assign(&xs);

    let config = FactorSvdConfig::default()
        .with_reciprocal_condition(1e-10)
        .with_inverse_policy(InversePolicy::Pseudoinverse);
    let mut svd = FactorSvd::with_config(config);
    svd.factor(&redundant)?;
    let coefficients = svd.solve(&ys)?;
    println!("rank = {}", svd.rank()?);
    println!(
        "slopes = ({:.4}, {:.4}), intercept = {:.4}",
        coefficients[0], coefficients[1], coefficients[2]
    );

    let pinv = svd.inverse::<f64>()?;
    println!("pseudoinverse shape = {:?}", pinv.dim());

    let diagnostics = svd.diagnostics()?;
    println!("{:#?}", diagnostics);
    Ok(())
}
